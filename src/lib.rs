//! ratlisp - a minimal Lisp runtime over exact rationals
//!
//! This crate turns source text into s-expression data and evaluates it against a
//! lexically scoped environment populated with a fixed table of native procedures.
//! Every number is an arbitrary-precision exact rational kept in canonical form.
//!
//! ```scheme
//! (+ 1/2 1/3)             ; => 5/6
//! (number->string 10 2)   ; => "1010"
//! (car (cons 1 2))        ; => 1
//! (null? '())             ; => #t
//! ```
//!
//! ## Truthiness
//!
//! Only the boolean `#f` is false. `0`, `""` and the empty list are all true in
//! conditional contexts.
//!
//! ## Error recovery
//!
//! Every failure is returned as an [`Error`] through the call chain. A failing
//! top-level form is abandoned, the environment keeps whatever bindings were in
//! place, and the caller (usually the interactive loop) decides how to continue.
//! Output already written by `display` is not undone.
//!
//! ## Modules
//!
//! - `number`: exact rational arithmetic
//! - `ast`: the runtime value model
//! - `lexer`: character stream to tokens, with one token of pushback
//! - `parser`: tokens to s-expressions
//! - `environment`: chained symbol-to-value frames
//! - `builtinops`: the native procedure table
//! - `evaluator`: a small evaluator and the file loading entry point

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the parser, guarding the recursive descent
/// against stack exhaustion on hostile input.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth, covering nested expressions and procedure calls.
pub const MAX_EVAL_DEPTH: usize = 512;

/// Maximum nesting of `load` calls, so a file that loads itself fails cleanly.
pub const MAX_LOAD_DEPTH: usize = 64;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// `#` followed by something other than `t` or `f`
    MalformedInput,
    /// A character that cannot start any token
    UnexpectedCharacter,
    /// String literal cut short by end of input or a control character
    UnterminatedString,
    /// Input ended inside a list
    UnbalancedParenthesis,
    /// A token that is not valid where it appears, e.g. a stray `)`
    UnexpectedToken,
    /// Number token that is not a valid exact rational
    InvalidNumber,
    /// Expression nesting exceeded the configured parse depth
    TooDeeplyNested,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ParseErrorKind::MalformedInput => "malformed input",
            ParseErrorKind::UnexpectedCharacter => "unexpected character",
            ParseErrorKind::UnterminatedString => "unterminated string",
            ParseErrorKind::UnbalancedParenthesis => "unbalanced parenthesis",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::InvalidNumber => "invalid number",
            ParseErrorKind::TooDeeplyNested => "too deeply nested",
        };
        f.write_str(name)
    }
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;
        const LEAD: usize = 20;

        // Work in characters so multi-byte input never splits a code point
        let error_char = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = error_char.saturating_sub(LEAD);
        let total_chars = input.chars().count();

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < total_chars {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    EvalError(String),
    TypeError(String),
    UnboundVariable(String),
    ArityError {
        procedure: String,
        expected: Arity,
        got: usize,
    },
    DivisionByZero,
    IoError(String),
    LoadError {
        path: String,
        source: Box<Error>,
    },
}

impl Error {
    pub fn arity_error(procedure: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::ArityError {
            procedure: procedure.into(),
            expected,
            got,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::TypeError(message.into())
    }

    /// True when the input simply ended too early, so more text could complete it.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Error::ParseError(ParseError {
                kind: ParseErrorKind::UnbalancedParenthesis,
                ..
            })
        )
    }

    /// The parse error kind, if this is a parse error.
    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            Error::ParseError(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError ({}): {}", e.kind, e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::ArityError {
                procedure,
                expected,
                got,
            } => write!(
                f,
                "ArityError: {procedure} expected {expected} argument(s), got {got}"
            ),
            Error::DivisionByZero => write!(f, "DivisionByZero: division by zero"),
            Error::IoError(msg) => write!(f, "IoError: {msg}"),
            Error::LoadError { path, source } => write!(f, "LoadError: {path}: {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::LoadError { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod number;
pub mod parser;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_snippet_marks_truncation() {
        let input = format!("{}(oops\n", "x".repeat(40));
        let err = ParseError::with_context(
            ParseErrorKind::UnbalancedParenthesis,
            "Unbalanced parenthesis",
            &input,
            40,
            None,
        );
        let context = err.context.unwrap_or_default();
        assert!(context.starts_with("[...]"), "got {context}");
        assert!(context.ends_with("(oops\\n"), "got {context}");
    }

    #[test]
    fn test_error_display() {
        let cases = vec![
            (
                Error::arity_error("car", Arity::Exact(1), 2),
                "ArityError: car expected exactly 1 argument(s), got 2",
            ),
            (Error::DivisionByZero, "DivisionByZero: division by zero"),
            (
                Error::type_error("car: argument is not a pair"),
                "TypeError: car: argument is not a pair",
            ),
            (
                Error::LoadError {
                    path: "lib.scm".into(),
                    source: Box::new(Error::UnboundVariable("x".into())),
                },
                "LoadError: lib.scm: Unbound variable: x",
            ),
        ];

        for (i, (error, expected)) in cases.iter().enumerate() {
            assert_eq!(format!("{error}"), *expected, "case #{}", i + 1);
        }
    }

    #[test]
    fn test_incomplete_classification() {
        let unbalanced = Error::ParseError(ParseError::new(
            ParseErrorKind::UnbalancedParenthesis,
            "Unbalanced parenthesis",
            None,
            None,
        ));
        let stray = Error::ParseError(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            "Unexpected ')' outside list",
            None,
            None,
        ));
        assert!(unbalanced.is_incomplete());
        assert!(!stray.is_incomplete());
        assert!(!Error::DivisionByZero.is_incomplete());
    }
}
