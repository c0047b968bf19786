//! A small evaluator over [`Value`] data, and the entry points for running
//! source text and files.
//!
//! Special forms are recognized by the symbol at the head of a list:
//! `quote`, `if`, `define`, `set!`, `lambda` and `begin`. Every other list is an
//! application: the operator and operands are evaluated left to right, and the
//! operands are handed to the procedure as one proper list.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::ast::{Lambda, Pair, Value};
use crate::builtinops::{Arity, register_builtins};
use crate::environment::Environment;
use crate::parser::Parser;
use crate::{Error, MAX_EVAL_DEPTH, MAX_LOAD_DEPTH};

/// Handler for a special form: the unevaluated operands, the active environment
/// and the current depth.
type SpecialForm = fn(&[Value], &Environment, usize) -> Result<Value, Error>;

fn special_form(name: &str) -> Option<SpecialForm> {
    match name {
        "quote" => Some(eval_quote),
        "if" => Some(eval_if),
        "define" => Some(eval_define),
        "set!" => Some(eval_set),
        "lambda" => Some(eval_lambda),
        "begin" => Some(eval_begin),
        _ => None,
    }
}

/// Evaluate an expression (public API)
///
/// Called from inside a builtin, as `load` does, evaluation continues from the
/// depth of that call rather than starting a fresh budget.
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, NATIVE_CALL_DEPTH.get())
}

/// Evaluate an expression with depth tracking to prevent stack overflow
fn eval_with_depth_tracking(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }
    match expr {
        // Self-evaluating forms, including the empty list
        Value::Nil
        | Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::NativeProcedure(_)
        | Value::Procedure(_) => Ok(expr.clone()),

        Value::Symbol(name) => env
            .get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_string())),

        Value::Pair(pair) => eval_pair(pair, env, depth).map_err(|err| add_context(err, expr)),
    }
}

/// Helper function to add expression context to errors. Only the innermost
/// failing expression is recorded.
fn add_context(error: Error, expr: &Value) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        Error::TypeError(msg) if !msg.contains(MARKER) => {
            Error::TypeError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        other => other,
    }
}

fn eval_pair(pair: &Pair, env: &Environment, depth: usize) -> Result<Value, Error> {
    let operands = pair.cdr();
    if operands.list_length().is_none() {
        return Err(Error::EvalError(format!(
            "Improper argument list: {operands}"
        )));
    }

    if let Value::Symbol(name) = pair.car()
        && let Some(form) = special_form(name)
    {
        let args = operands.to_vec()?;
        return form(&args, env, depth);
    }

    let func = eval_with_depth_tracking(pair.car(), env, depth + 1)?;
    let mut args = Vec::new();
    for arg in operands.iter() {
        args.push(eval_with_depth_tracking(arg, env, depth + 1)?);
    }
    apply(&func, args, env, depth)
}

/// Call a procedure with already evaluated arguments.
fn apply(func: &Value, args: Vec<Value>, env: &Environment, depth: usize) -> Result<Value, Error> {
    match func {
        Value::NativeProcedure(native) => {
            let _call = NativeCallGuard::enter(depth + 1);
            (native.func)(&Value::list(args), env)
        }
        Value::Procedure(lambda) => {
            let frame = bind_arguments(lambda, args)?;
            eval_body(&lambda.body, &frame, depth + 1)
        }
        _ => Err(Error::EvalError(format!(
            "Cannot apply non-procedure: {func}"
        ))),
    }
}

/// A new frame under the closure environment with every parameter bound.
fn bind_arguments(lambda: &Lambda, args: Vec<Value>) -> Result<Environment, Error> {
    let required = lambda.params.len();
    let arity = match lambda.rest {
        Some(_) => Arity::AtLeast(required),
        None => Arity::Exact(required),
    };
    let name = lambda.name.as_deref().unwrap_or("lambda");
    arity.validate(name, args.len())?;

    let frame = Environment::with_parent(&lambda.env);
    let mut args = args.into_iter();
    for (param, arg) in lambda.params.iter().zip(args.by_ref()) {
        frame.define(param.clone(), arg);
    }
    if let Some(rest) = &lambda.rest {
        frame.define(rest.clone(), Value::list(args.collect::<Vec<_>>()));
    }
    Ok(frame)
}

/// Evaluate body forms in order, returning the last value or `Nil` if empty.
fn eval_body(body: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in body {
        result = eval_with_depth_tracking(expr, env, depth + 1)?;
    }
    Ok(result)
}

/// Evaluate quote special form
fn eval_quote(args: &[Value], _env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error("quote", Arity::Exact(1), args.len())),
    }
}

/// Evaluate if special form. A missing else branch yields the empty list.
fn eval_if(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let (condition_expr, then_expr, else_expr) = match args {
        [c, t] => (c, t, None),
        [c, t, e] => (c, t, Some(e)),
        _ => return Err(Error::arity_error("if", Arity::Range(2, 3), args.len())),
    };

    if eval_with_depth_tracking(condition_expr, env, depth + 1)?.is_truthy() {
        eval_with_depth_tracking(then_expr, env, depth + 1)
    } else if let Some(else_expr) = else_expr {
        eval_with_depth_tracking(else_expr, env, depth + 1)
    } else {
        Ok(Value::Nil)
    }
}

/// Evaluate define special form, in both its plain and procedure shorthand shapes
fn eval_define(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth + 1)?;
            env.define(name.clone(), value);
            Ok(Value::Symbol(name.clone()))
        }
        // (define (name . params) body...)
        [Value::Pair(signature), body @ ..] if !body.is_empty() => {
            let Value::Symbol(name) = signature.car() else {
                return Err(Error::type_error(format!(
                    "define: procedure name must be a symbol, got {}",
                    signature.car()
                )));
            };
            let lambda = make_lambda(Some(name.clone()), signature.cdr(), body, env)?;
            env.define(name.clone(), lambda);
            Ok(Value::Symbol(name.clone()))
        }
        [Value::Symbol(_) | Value::Pair(_), ..] => {
            Err(Error::arity_error("define", Arity::Exact(2), args.len()))
        }
        [other, ..] => Err(Error::type_error(format!(
            "define requires a symbol or a (name . params) list, got {other}"
        ))),
        [] => Err(Error::arity_error("define", Arity::AtLeast(2), 0)),
    }
}

/// Evaluate set! special form. Returns the assigned value.
fn eval_set(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth + 1)?;
            env.set(name, value.clone())?;
            Ok(value)
        }
        [other, _] => Err(Error::type_error(format!(
            "set! requires a symbol, got {other}"
        ))),
        _ => Err(Error::arity_error("set!", Arity::Exact(2), args.len())),
    }
}

/// Evaluate lambda special form
fn eval_lambda(args: &[Value], env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [params, body @ ..] if !body.is_empty() => make_lambda(None, params, body, env),
        _ => Err(Error::arity_error("lambda", Arity::AtLeast(2), args.len())),
    }
}

/// Evaluate begin special form
fn eval_begin(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    eval_body(args, env, depth)
}

fn make_lambda(
    name: Option<Rc<str>>,
    params: &Value,
    body: &[Value],
    env: &Environment,
) -> Result<Value, Error> {
    let (params, rest) = parse_params(params)?;
    Ok(Value::Procedure(Rc::new(Lambda {
        name,
        params,
        rest,
        body: body.to_vec(),
        env: env.clone(),
    })))
}

/// Split a parameter list into the required names and the optional rest name.
///
/// Accepts a proper list `(a b)`, a dotted list `(a . rest)` or a single symbol
/// that collects every argument.
fn parse_params(list: &Value) -> Result<(Vec<Rc<str>>, Option<Rc<str>>), Error> {
    let mut params: Vec<Rc<str>> = Vec::new();
    let mut current = list;
    let rest = loop {
        match current {
            Value::Nil => break None,
            Value::Symbol(name) => break Some(name.clone()),
            Value::Pair(pair) => {
                let Value::Symbol(name) = pair.car() else {
                    return Err(Error::type_error(format!(
                        "lambda parameters must be symbols, got {}",
                        pair.car()
                    )));
                };
                if params.contains(name) {
                    return Err(Error::EvalError(format!(
                        "Duplicate parameter name: {name}"
                    )));
                }
                params.push(name.clone());
                current = pair.cdr();
            }
            other => {
                return Err(Error::type_error(format!(
                    "lambda parameters must be symbols, got {other}"
                )));
            }
        }
    };

    if let Some(rest) = &rest
        && params.contains(rest)
    {
        return Err(Error::EvalError(format!(
            "Duplicate parameter name: {rest}"
        )));
    }
    Ok((params, rest))
}

/// Parse and evaluate every top-level form of `source` in order.
///
/// Forms are read one at a time, so everything before a failing form has
/// already taken effect. Returns the last value, or `Nil` for empty input.
pub fn eval_source(source: &str, env: &Environment) -> Result<Value, Error> {
    let mut parser = Parser::new(source);
    let mut result = Value::Nil;
    while let Some(expr) = parser.next_expr()? {
        trace!(form = %expr, "evaluating");
        result = eval(&expr, env)?;
    }
    Ok(result)
}

thread_local! {
    static LOAD_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Evaluation depth of the innermost active native call
    static NATIVE_CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Publishes the depth of a native call for as long as it is alive.
struct NativeCallGuard {
    previous: usize,
}

impl NativeCallGuard {
    fn enter(depth: usize) -> NativeCallGuard {
        NativeCallGuard {
            previous: NATIVE_CALL_DEPTH.replace(depth),
        }
    }
}

impl Drop for NativeCallGuard {
    fn drop(&mut self) {
        NATIVE_CALL_DEPTH.set(self.previous);
    }
}

/// Tracks one level of nested file loading for as long as it is alive.
struct LoadGuard;

impl LoadGuard {
    fn enter() -> Option<LoadGuard> {
        LOAD_DEPTH.with(|depth| {
            if depth.get() >= MAX_LOAD_DEPTH {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(LoadGuard)
            }
        })
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        LOAD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Read the file at `path` and evaluate its forms into `env`.
///
/// Any failure, including being unable to read the file, comes back as
/// [`Error::LoadError`] naming the path and wrapping the underlying error.
pub fn eval_file(path: impl AsRef<Path>, env: &Environment) -> Result<Value, Error> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    debug!(path = %shown, "loading file");

    let result = match LoadGuard::enter() {
        Some(_guard) => std::fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("cannot read {shown}: {e}")))
            .and_then(|source| eval_source(&source, env)),
        None => Err(Error::EvalError(format!(
            "load nested too deeply (max: {MAX_LOAD_DEPTH})"
        ))),
    };

    result.map_err(|source| {
        warn!(path = %shown, error = %source, "load aborted");
        Error::LoadError {
            path: shown,
            source: Box::new(source),
        }
    })
}

/// Create a global environment with built-in functions
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    register_builtins(&env);
    env
}
