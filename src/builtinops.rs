//! Native procedure table.
//!
//! Each builtin receives its evaluated arguments as one proper list together with
//! the environment of the call, and returns a single value or an [`Error`].
//!
//! ```scheme
//! (+ 1 2 3)              ; arithmetic folds over exact rationals
//! (<= 1 2 2 3)           ; chained comparison
//! (car (cons 1 2))       ; pair access
//! (number->string 10 2)  ; radix conversion
//! ```
//!
//! ## Argument checking
//!
//! There is no central arity check. Every builtin validates its own argument
//! count with [`Arity::validate`] and the variants of its arguments, so the
//! table itself is nothing more than name/function pairs.
//!
//! ## Adding a builtin
//!
//! 1. Write a function with the [`NativeFn`] signature
//! 2. Validate arity and argument types inside it
//! 3. Add a `BuiltinOp` entry to `BUILTIN_OPS`
//! 4. Add tests covering both the result and the error cases

use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::ast::{NativeFn, Value};
use crate::environment::Environment;
use crate::evaluator::eval_file;
use crate::number::Number;

/// Accepted argument counts for a procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }

    /// Check the argument count of a call to `procedure`.
    pub fn validate(&self, procedure: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(procedure, *self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

/// Definition of a built-in procedure
#[derive(Debug, Clone, Copy)]
pub struct BuiltinOp {
    pub name: &'static str,
    pub func: NativeFn,
}

//
// Argument helpers
//

/// Destructure an argument list of exactly `N` elements.
fn fixed_args<'v, const N: usize>(name: &str, args: &'v Value) -> Result<[&'v Value; N], Error> {
    let items: Vec<&Value> = args.iter().collect();
    let got = items.len();
    items
        .try_into()
        .map_err(|_| Error::arity_error(name, Arity::Exact(N), got))
}

fn number_arg<'v>(name: &str, value: &'v Value) -> Result<&'v Number, Error> {
    value.as_number().ok_or_else(|| {
        Error::type_error(format!(
            "{name}: expects a number, got {} {value}",
            value.type_name()
        ))
    })
}

fn string_arg<'v>(name: &str, value: &'v Value) -> Result<&'v Rc<str>, Error> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_error(format!(
            "{name}: expects a string, got {} {other}",
            other.type_name()
        ))),
    }
}

fn io_error(e: std::io::Error) -> Error {
    Error::IoError(format!("writing output: {e}"))
}

//
// Arithmetic
//

fn builtin_add(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let mut sum = Number::zero();
    for arg in args.iter() {
        sum = &sum + number_arg("+", arg)?;
    }
    Ok(Value::Number(sum))
}

fn builtin_mul(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let mut product = Number::one();
    for arg in args.iter() {
        product = &product * number_arg("*", arg)?;
    }
    Ok(Value::Number(product))
}

fn builtin_sub(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let mut iter = args.iter().peekable();
    let Some(first) = iter.next() else {
        return Err(Error::arity_error("-", Arity::AtLeast(1), 0));
    };
    let first = number_arg("-", first)?;

    // unary: negate
    if iter.peek().is_none() {
        return Ok(Value::Number(-first));
    }

    let mut result = first.clone();
    for arg in iter {
        result = &result - number_arg("-", arg)?;
    }
    Ok(Value::Number(result))
}

fn builtin_div(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let mut iter = args.iter().peekable();
    let Some(first) = iter.next() else {
        return Err(Error::arity_error("/", Arity::AtLeast(1), 0));
    };
    let first = number_arg("/", first)?;

    // unary: reciprocal
    if iter.peek().is_none() {
        return first.recip().map(Value::Number);
    }

    let mut result = first.clone();
    for arg in iter {
        result = result.checked_div(number_arg("/", arg)?)?;
    }
    Ok(Value::Number(result))
}

// Chained comparison over adjacent pairs. No arguments is vacuously true, and the
// first failing pair ends the walk.
macro_rules! numeric_comparison {
    ($name:ident, $op_str:literal, $holds:path) => {
        fn $name(args: &Value, _env: &Environment) -> Result<Value, Error> {
            let mut iter = args.iter();
            let Some(first) = iter.next() else {
                return Ok(Value::Bool(true));
            };

            let mut prev = number_arg($op_str, first)?;
            for current in iter {
                let current = number_arg($op_str, current)?;
                if !$holds(prev.compare(current)) {
                    return Ok(Value::Bool(false));
                }
                prev = current;
            }

            Ok(Value::Bool(true))
        }
    };
}

numeric_comparison!(builtin_num_eq, "=", Ordering::is_eq);
numeric_comparison!(builtin_le, "<=", Ordering::is_le);

//
// Predicates
//

fn builtin_null(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("null?", args)?;
    Ok(Value::Bool(value.is_nil()))
}

fn builtin_true(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("true?", args)?;
    Ok(Value::Bool(value.is_truthy()))
}

fn builtin_pair(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("pair?", args)?;
    Ok(Value::Bool(value.is_pair()))
}

fn builtin_number(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("number?", args)?;
    Ok(Value::Bool(matches!(value, Value::Number(_))))
}

fn builtin_eq(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [first, second] = fixed_args::<2>("eq?", args)?;
    Ok(Value::Bool(first.is_identical(second)))
}

//
// Pairs and lists
//

fn builtin_cons(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [car, cdr] = fixed_args::<2>("cons", args)?;
    Ok(Value::cons(car.clone(), cdr.clone()))
}

fn builtin_car(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("car", args)?;
    match value.as_pair() {
        Some(pair) => Ok(pair.car().clone()),
        None => Err(Error::type_error(format!(
            "car: argument is not a pair: {value}"
        ))),
    }
}

fn builtin_cdr(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let [value] = fixed_args::<1>("cdr", args)?;
    match value.as_pair() {
        Some(pair) => Ok(pair.cdr().clone()),
        None => Err(Error::type_error(format!(
            "cdr: argument is not a pair: {value}"
        ))),
    }
}

// The arguments already arrive as a fresh proper list
fn builtin_list(args: &Value, _env: &Environment) -> Result<Value, Error> {
    Ok(args.clone())
}

//
// Conversion
//

fn builtin_number_to_string(args: &Value, _env: &Environment) -> Result<Value, Error> {
    const NAME: &str = "number->string";
    let items: Vec<&Value> = args.iter().collect();
    let (value, base) = match items.as_slice() {
        [value] => (*value, None),
        [value, base] => (*value, Some(*base)),
        _ => return Err(Error::arity_error(NAME, Arity::Range(1, 2), items.len())),
    };

    let number = number_arg(NAME, value)?;
    let radix = match base {
        None => 10,
        Some(base) => {
            let base = number_arg(NAME, base)?;
            if !base.is_integer() || !base.is_positive() {
                return Err(Error::type_error(format!(
                    "{NAME}: base argument must be a positive whole number, got {base}"
                )));
            }
            let Some(radix) = base.to_u32() else {
                return Err(Error::EvalError(format!(
                    "{NAME}: unsupported radix {base}"
                )));
            };
            radix
        }
    };

    Ok(Value::from(number.to_string_radix(radix)?))
}

//
// Input/output
//

fn builtin_display(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let texts: Vec<&Value> = args.iter().collect();
    Arity::AtLeast(1).validate("display", texts.len())?;

    let mut out = std::io::stdout().lock();
    for text in texts {
        // Earlier strings stay written if a later argument is rejected
        let text = string_arg("display", text)?;
        write!(out, "{text}").map_err(io_error)?;
    }
    out.flush().map_err(io_error)?;
    Ok(Value::Bool(true))
}

fn builtin_newline(args: &Value, _env: &Environment) -> Result<Value, Error> {
    fixed_args::<0>("newline", args)?;
    let mut out = std::io::stdout().lock();
    writeln!(out).map_err(io_error)?;
    out.flush().map_err(io_error)?;
    Ok(Value::Bool(true))
}

fn address(value: &Value) -> String {
    match value {
        Value::Pair(pair) => format!("{:p}", Rc::as_ptr(pair)),
        Value::String(s) => format!("{:p}", Rc::as_ptr(s)),
        Value::NativeProcedure(p) => format!("{:p}", Rc::as_ptr(p)),
        Value::Procedure(p) => format!("{:p}", Rc::as_ptr(p)),
        other => format!("<{}>", other.type_name()),
    }
}

fn builtin_debug(args: &Value, _env: &Environment) -> Result<Value, Error> {
    let mut out = std::io::stdout().lock();
    writeln!(out).map_err(io_error)?;
    writeln!(out, "{}", address(args)).map_err(io_error)?;
    if let Some(pair) = args.as_pair() {
        writeln!(out, "{}", address(pair.car())).map_err(io_error)?;
    }
    writeln!(out, "{args}").map_err(io_error)?;
    writeln!(out).map_err(io_error)?;
    out.flush().map_err(io_error)?;
    Ok(Value::Bool(true))
}

fn builtin_debugenv(_args: &Value, env: &Environment) -> Result<Value, Error> {
    let mut out = std::io::stdout().lock();
    for (name, value) in env.get_all_bindings() {
        writeln!(out, "{name} = {value}").map_err(io_error)?;
    }
    out.flush().map_err(io_error)?;
    Ok(Value::Bool(true))
}

//
// Files
//

fn builtin_load(args: &Value, env: &Environment) -> Result<Value, Error> {
    let files: Vec<&Value> = args.iter().collect();
    Arity::AtLeast(1).validate("load", files.len())?;

    for file in files {
        let path = string_arg("load", file)?;
        eval_file(path.as_ref(), env)?;
    }
    Ok(Value::Bool(true))
}

/// Registry of all builtins, bound at startup in this order.
static BUILTIN_OPS: &[BuiltinOp] = &[
    BuiltinOp {
        name: "+",
        func: builtin_add,
    },
    BuiltinOp {
        name: "-",
        func: builtin_sub,
    },
    BuiltinOp {
        name: "*",
        func: builtin_mul,
    },
    BuiltinOp {
        name: "/",
        func: builtin_div,
    },
    BuiltinOp {
        name: "true?",
        func: builtin_true,
    },
    BuiltinOp {
        name: "null?",
        func: builtin_null,
    },
    BuiltinOp {
        name: "pair?",
        func: builtin_pair,
    },
    BuiltinOp {
        name: "number?",
        func: builtin_number,
    },
    BuiltinOp {
        name: "number->string",
        func: builtin_number_to_string,
    },
    BuiltinOp {
        name: "eq?",
        func: builtin_eq,
    },
    BuiltinOp {
        name: "<=",
        func: builtin_le,
    },
    BuiltinOp {
        name: "=",
        func: builtin_num_eq,
    },
    BuiltinOp {
        name: "load",
        func: builtin_load,
    },
    BuiltinOp {
        name: "cons",
        func: builtin_cons,
    },
    BuiltinOp {
        name: "car",
        func: builtin_car,
    },
    BuiltinOp {
        name: "cdr",
        func: builtin_cdr,
    },
    BuiltinOp {
        name: "list",
        func: builtin_list,
    },
    BuiltinOp {
        name: "display",
        func: builtin_display,
    },
    BuiltinOp {
        name: "newline",
        func: builtin_newline,
    },
    BuiltinOp {
        name: "debug",
        func: builtin_debug,
    },
    BuiltinOp {
        name: "debugenv",
        func: builtin_debugenv,
    },
];

pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

pub fn find_builtin(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_OPS.iter().find(|op| op.name == name)
}

/// Bind every builtin name to its native procedure in `env`.
pub fn register_builtins(env: &Environment) {
    for op in BUILTIN_OPS {
        env.define(op.name, Value::native(op.name, op.func));
    }
    debug!(count = BUILTIN_OPS.len(), "registered builtins");
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};

    fn ratio(n: i64, d: i64) -> Value {
        Value::Number(Number::from_ratio(n, d).unwrap())
    }

    /// Invoke a builtin through the registry with the given arguments.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin(name).unwrap_or_else(|| panic!("no builtin {name}"));
        (op.func)(&Value::list(args.to_vec()), &Environment::new())
    }

    /// Expected outcome of a builtin call
    #[derive(Debug)]
    enum Expect {
        Returns(Value),
        TypeError,
        ArityError,
        DivisionByZero,
        EvalError,
    }
    use Expect::*;

    fn returns<T: Into<Value>>(value: T) -> Expect {
        Returns(value.into())
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Expect);

        let pair = Value::cons(val(1), val(2));

        let test_cases: Vec<TestCase> = vec![
            // ===== ARITHMETIC =====
            test!("+", &[], returns(0)),
            test!("+", &[val(5)], returns(5)),
            test!("+", &[val(1), val(2), val(3)], returns(6)),
            test!("+", &[ratio(1, 2), ratio(1, 2)], returns(1)),
            test!("+", &[ratio(1, 2), ratio(1, 3)], Returns(ratio(5, 6))),
            test!("+", &[val("1")], TypeError),
            test!("+", &[val(1), val(true)], TypeError),
            test!("*", &[], returns(1)),
            test!("*", &[val(2), val(3), val(4)], returns(24)),
            test!("*", &[ratio(2, 3), val(3)], returns(2)),
            test!("*", &[val(2), nil()], TypeError),
            test!("-", &[val(5)], returns(-5)),
            test!("-", &[ratio(-1, 2)], Returns(ratio(1, 2))),
            test!("-", &[val(5), val(2), val(1)], returns(2)),
            test!("-", &[val(1), ratio(1, 3)], Returns(ratio(2, 3))),
            test!("-", &[], ArityError),
            test!("-", &[val("x")], TypeError),
            test!("-", &[val(5), val(false)], TypeError),
            test!("/", &[val(2)], Returns(ratio(1, 2))),
            test!("/", &[val(1), val(2)], Returns(ratio(1, 2))),
            test!("/", &[val(12), val(2), val(3)], returns(2)),
            test!("/", &[ratio(1, 2)], returns(2)),
            test!("/", &[val(1), val(0)], DivisionByZero),
            test!("/", &[val(0)], DivisionByZero),
            test!("/", &[val(1), val(2), val(0)], DivisionByZero),
            test!("/", &[], ArityError),
            test!("/", &[sym("a")], TypeError),
            // ===== COMPARISON =====
            test!("=", &[], returns(true)),
            test!("=", &[val(1)], returns(true)),
            test!("=", &[val(1), val(1), val(1)], returns(true)),
            test!("=", &[val(1), val(2)], returns(false)),
            test!("=", &[ratio(2, 4), ratio(1, 2)], returns(true)),
            test!("=", &[val("a")], TypeError),
            test!("=", &[val(1), val("a")], TypeError),
            // The first failing pair ends the walk before later arguments are checked
            test!("=", &[val(1), val(2), val("a")], returns(false)),
            test!("<=", &[], returns(true)),
            test!("<=", &[val(3)], returns(true)),
            test!("<=", &[val(1), val(2), val(2), val(3)], returns(true)),
            test!("<=", &[val(3), val(2)], returns(false)),
            test!("<=", &[ratio(1, 3), ratio(1, 2)], returns(true)),
            test!("<=", &[val(-1), val(-2)], returns(false)),
            test!("<=", &[val(1), sym("x")], TypeError),
            // ===== PREDICATES =====
            test!("null?", &[nil()], returns(true)),
            test!("null?", &[val(0)], returns(false)),
            test!("null?", &[val([1])], returns(false)),
            test!("null?", &[], ArityError),
            test!("null?", &[nil(), nil()], ArityError),
            test!("true?", &[val(false)], returns(false)),
            test!("true?", &[val(true)], returns(true)),
            test!("true?", &[val(0)], returns(true)),
            test!("true?", &[val("")], returns(true)),
            test!("true?", &[nil()], returns(true)),
            test!("true?", &[], ArityError),
            test!("pair?", &[pair.clone()], returns(true)),
            test!("pair?", &[val([1, 2])], returns(true)),
            test!("pair?", &[nil()], returns(false)),
            test!("pair?", &[val(1)], returns(false)),
            test!("pair?", &[val(1), val(2)], ArityError),
            test!("number?", &[val(1)], returns(true)),
            test!("number?", &[ratio(1, 3)], returns(true)),
            test!("number?", &[val("1")], returns(false)),
            test!("number?", &[], ArityError),
            test!("eq?", &[sym("a"), sym("a")], returns(true)),
            test!("eq?", &[sym("a"), sym("b")], returns(false)),
            test!("eq?", &[pair.clone(), pair.clone()], returns(true)),
            test!("eq?", &[val([1]), val([1])], returns(false)),
            test!("eq?", &[nil(), nil()], returns(true)),
            test!("eq?", &[val(true), val(true)], returns(true)),
            test!("eq?", &[val(1)], ArityError),
            test!("eq?", &[val(1), val(1), val(1)], ArityError),
            // ===== PAIRS =====
            test!("cons", &[val(1), val(2)], Returns(pair.clone())),
            test!("cons", &[val(1), nil()], returns([1])),
            test!("cons", &[val(1)], ArityError),
            test!("cons", &[val(1), val(2), val(3)], ArityError),
            test!("car", &[pair.clone()], returns(1)),
            test!("car", &[val([7, 8])], returns(7)),
            test!("car", &[val(5)], TypeError),
            test!("car", &[nil()], TypeError),
            test!("car", &[], ArityError),
            test!("cdr", &[pair.clone()], returns(2)),
            test!("cdr", &[val([7, 8])], returns([8])),
            test!("cdr", &[val("s")], TypeError),
            test!("cdr", &[pair.clone(), pair.clone()], ArityError),
            test!("list", &[], Returns(nil())),
            test!(
                "list",
                &[val(1), val("a"), sym("b")],
                returns(vec![val(1), val("a"), sym("b")])
            ),
            // ===== CONVERSION =====
            test!("number->string", &[val(10)], returns("10")),
            test!("number->string", &[val(10), val(2)], returns("1010")),
            test!("number->string", &[val(255), val(16)], returns("ff")),
            test!("number->string", &[ratio(1, 2)], returns("1/2")),
            test!(
                "number->string",
                &[ratio(-3, 4), val(2)],
                returns("-11/100")
            ),
            test!("number->string", &[val(10), val(0)], TypeError),
            test!("number->string", &[val(10), val(-2)], TypeError),
            test!("number->string", &[val(10), ratio(3, 2)], TypeError),
            test!("number->string", &[val(10), val("2")], TypeError),
            test!("number->string", &[val("10")], TypeError),
            test!("number->string", &[val(10), val(1)], EvalError),
            test!("number->string", &[val(61), val(62)], returns("z")),
            test!("number->string", &[val(10), val(63)], EvalError),
            test!("number->string", &[], ArityError),
            test!("number->string", &[val(1), val(2), val(3)], ArityError),
            // ===== OUTPUT =====
            test!("display", &[val("")], returns(true)),
            test!("display", &[], ArityError),
            test!("display", &[val(1)], TypeError),
            test!("newline", &[], returns(true)),
            test!("newline", &[val(1)], ArityError),
            test!("debug", &[val([1, 2])], returns(true)),
            test!("debugenv", &[], returns(true)),
            // ===== LOAD (argument checks only) =====
            test!("load", &[], ArityError),
            test!("load", &[val(1)], TypeError),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("Builtin test #{} ({name})", i + 1);
            match (result, expected) {
                (Ok(actual), Returns(expected)) => {
                    assert_eq!(actual, expected, "{test_id}");
                }
                (Err(Error::TypeError(_)), TypeError)
                | (Err(Error::ArityError { .. }), ArityError)
                | (Err(Error::DivisionByZero), DivisionByZero)
                | (Err(Error::EvalError(_)), EvalError) => {}
                (result, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {result:?}");
                }
            }
        }
    }

    #[test]
    fn test_car_cdr_preserve_identity() {
        let inner = val([1, 2]);
        let pair = Value::cons(inner.clone(), nil());
        let car = call_builtin("car", &[pair]).unwrap();
        assert!(car.is_identical(&inner));
    }

    #[test]
    fn test_list_returns_argument_list() {
        let args = Value::list([val(1), val(2)]);
        let op = find_builtin("list").unwrap();
        let result = (op.func)(&args, &Environment::new()).unwrap();
        assert!(result.is_identical(&args));
    }

    #[test]
    fn test_arity_reporting() {
        let err = call_builtin("car", &[val(1), val(2)]).unwrap_err();
        assert_eq!(err, Error::arity_error("car", Arity::Exact(1), 2));
        assert_eq!(
            format!("{err}"),
            "ArityError: car expected exactly 1 argument(s), got 2"
        );

        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(3));
        assert!(Arity::AtLeast(0).accepts(0));
        assert_eq!(format!("{}", Arity::Range(1, 2)), "1 to 2");
    }

    #[test]
    fn test_registry_contents() {
        let names: Vec<&str> = get_builtin_ops().iter().map(|op| op.name).collect();
        assert_eq!(
            names,
            vec![
                "+", "-", "*", "/", "true?", "null?", "pair?", "number?", "number->string",
                "eq?", "<=", "=", "load", "cons", "car", "cdr", "list", "display", "newline",
                "debug", "debugenv",
            ]
        );
        assert!(find_builtin("unknown").is_none());
    }

    #[test]
    fn test_register_builtins_binds_procedures() {
        let env = Environment::new();
        register_builtins(&env);

        for op in get_builtin_ops() {
            match env.get(op.name) {
                Some(Value::NativeProcedure(p)) => assert_eq!(p.name, op.name),
                other => panic!("{} bound to {other:?}", op.name),
            }
        }

        // Each name is a single procedure value, so eq? holds for repeated lookups
        let first = env.get("car").unwrap();
        let second = env.get("car").unwrap();
        assert!(first.is_identical(&second));
    }
}
