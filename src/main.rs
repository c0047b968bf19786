//! ratlisp command line: load files, evaluate expressions, then run the REPL

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ratlisp::ast::Value;
use ratlisp::environment::Environment;
use ratlisp::evaluator::{self, create_global_env};
use ratlisp::parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "ratlisp> ";
const CONTINUATION_PROMPT: &str = "   ...> ";

/// Minimal Lisp over exact rational numbers
#[derive(Parser, Debug)]
#[command(name = "ratlisp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source files to load, in order, before anything else
    files: Vec<PathBuf>,

    /// Exit after loading files and evaluating expressions instead of starting the REPL
    #[arg(short, long)]
    batch: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    /// Expression to evaluate after loading files (repeatable)
    #[arg(short, long = "eval", value_name = "EXPR")]
    eval: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let env = create_global_env();

    for path in &args.files {
        let result = evaluator::eval_file(path, &env);
        if args.batch {
            result.with_context(|| format!("failed to load {}", path.display()))?;
        } else if let Err(e) = result {
            eprintln!("Error: {e}");
        }
    }

    for source in &args.eval {
        match evaluator::eval_source(source, &env) {
            Ok(value) => println!("{value}"),
            Err(e) if args.batch => {
                return Err(e).with_context(|| format!("failed to evaluate {source}"));
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    if !args.batch {
        run_repl(&env)?;
    }
    Ok(())
}

fn run_repl(env: &Environment) -> Result<()> {
    println!("ratlisp: exact rational Lisp");
    println!("Type :help for commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new().context("could not initialize line editor")?;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };

        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                return Ok(());
            }
            Err(err) => return Err(err).context("reading input"),
        };

        if buffer.is_empty() {
            match line.trim() {
                "" => continue,
                ":help" => {
                    print_help();
                    continue;
                }
                ":env" => {
                    print_environment(env);
                    continue;
                }
                ":quit" | ":exit" => {
                    println!("Goodbye!");
                    return Ok(());
                }
                _ => {}
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');

        // Check the whole buffer before running any of it, so that complete forms
        // ahead of an unfinished one are not evaluated twice
        if let Err(e) = parser::parse_all(&buffer)
            && e.is_incomplete()
        {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        let _ = rl.add_history_entry(source.trim_end());

        match evaluator::eval_source(&source, env) {
            Ok(value) => println!("{value}"),
            Err(e) => println!("Error: {e}"),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: quote ('x), if, define, set!, lambda, begin");
    println!("Builtins: + - * / = <= null? true? pair? number? eq?");
    println!("          cons car cdr list display newline number->string");
    println!("          load debug debugenv");
    println!();
    println!("Examples:");
    println!("  (+ 1/2 1/3)");
    println!("  (define (square x) (* x x))");
    println!("  (number->string (square 12) 16)");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in procedures from user-defined values
    let (builtins, user_defined): (Vec<_>, Vec<_>) = bindings
        .into_iter()
        .partition(|(_, value)| matches!(value, Value::NativeProcedure(_)));

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        // Print in columns for readability
        for row in builtins.chunks(4) {
            for (name, _) in row {
                print!("  {name:<15}");
            }
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
