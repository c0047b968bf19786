//! This module defines the runtime value model. [`Value`] is a closed set of
//! variants covering every datum the language can produce: the empty list, pairs,
//! symbols, booleans, exact numbers, strings and procedures. Pairs are reference
//! counted so that lists can be shared between the environment, the evaluator and
//! builtins without copying, and so that `eq?` can compare allocations.
//!
//! Helper functions such as [`val`], [`sym`] and [`nil`] plus `From` impls for
//! Rust literals, arrays and vectors make it easy to build values in tests.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::environment::Environment;
use crate::number::Number;

/// Signature shared by every native procedure: the evaluated argument list as a
/// proper list, and the environment the call happens in.
pub type NativeFn = fn(&Value, &Environment) -> Result<Value, Error>;

/// Core value type
#[derive(Clone)]
pub enum Value {
    /// The empty list, also the end-of-list marker
    Nil,
    /// A cons cell
    Pair(Rc<Pair>),
    /// Symbols compare by text
    Symbol(Rc<str>),
    Bool(bool),
    /// Exact rational, always canonical
    Number(Number),
    /// Immutable string
    String(Rc<str>),
    /// Procedure implemented in Rust
    NativeProcedure(Rc<NativeProcedure>),
    /// Procedure created by `lambda`
    Procedure(Rc<Lambda>),
}

/// An ordered pair. The fields are immutable once built.
pub struct Pair {
    car: Value,
    cdr: Value,
}

impl Pair {
    pub fn car(&self) -> &Value {
        &self.car
    }

    pub fn cdr(&self) -> &Value {
        &self.cdr
    }
}

// Unlink the cdr chain iteratively so dropping a long list does not recurse once
// per element.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut next = std::mem::replace(&mut self.cdr, Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(&mut pair.cdr, Value::Nil),
                Err(_) => break,
            }
        }
    }
}

pub struct NativeProcedure {
    pub name: &'static str,
    pub func: NativeFn,
}

/// A user procedure: parameter names, an optional rest parameter, the body forms
/// and the environment it closes over.
pub struct Lambda {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub rest: Option<Rc<str>>,
    pub body: Vec<Value>,
    pub env: Environment,
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Pair { car, cdr }))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Value {
        Value::NativeProcedure(Rc::new(NativeProcedure { name, func }))
    }

    /// Build a proper list from the items, in order.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::cons(item, tail))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Value::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Iterate over the elements of a list. Iteration stops at the first
    /// non-pair tail, so an improper list yields only its paired elements.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Count the elements of a proper list; `None` for an improper one.
    pub fn list_length(&self) -> Option<usize> {
        let mut count = 0;
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Some(count),
                Value::Pair(pair) => {
                    count += 1;
                    current = &pair.cdr;
                }
                _ => return None,
            }
        }
    }

    /// Collect the elements of a proper list.
    pub fn to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Ok(items),
                Value::Pair(pair) => {
                    items.push(pair.car.clone());
                    current = &pair.cdr;
                }
                _ => {
                    return Err(Error::EvalError(format!(
                        "expected a proper list, got {self}"
                    )));
                }
            }
        }
    }

    /// Identity comparison used by `eq?`.
    ///
    /// Symbols, booleans, the empty list and numbers compare by value; pairs,
    /// strings and procedures compare by allocation.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::NativeProcedure(a), Value::NativeProcedure(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "empty list",
            Value::Pair(_) => "pair",
            Value::Symbol(_) => "symbol",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::NativeProcedure(_) | Value::Procedure(_) => "procedure",
        }
    }
}

pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.cdr;
                Some(&pair.car)
            }
            _ => None,
        }
    }
}

impl std::iter::FusedIterator for ListIter<'_> {}

/// Walk a list for printing, calling `item` per element and `tail` for a
/// non-empty improper tail.
fn write_list(
    f: &mut fmt::Formatter<'_>,
    list: &Value,
    item: fn(&mut fmt::Formatter<'_>, &Value) -> fmt::Result,
) -> fmt::Result {
    let mut current = list;
    let mut first = true;
    loop {
        match current {
            Value::Pair(pair) => {
                if !first {
                    write!(f, " ")?;
                }
                first = false;
                item(f, &pair.car)?;
                current = &pair.cdr;
            }
            Value::Nil => return Ok(()),
            tail => {
                write!(f, " . ")?;
                return item(f, tail);
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => {
                write!(f, "List(")?;
                write_list(f, self, |f, v| write!(f, "{v:?}"))?;
                write!(f, ")")
            }
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::NativeProcedure(p) => write!(f, "NativeProcedure({})", p.name),
            Value::Procedure(p) => match &p.name {
                Some(name) => write!(f, "Procedure({name})"),
                None => write!(f, "Procedure(<anonymous>)"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "()"),
            Value::Pair(_) => {
                write!(f, "(")?;
                write_list(f, self, |f, v| write!(f, "{v}"))?;
                write!(f, ")")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Number(n) => write!(f, "{n}"),
            // Literals cannot contain quotes or control characters, so no escaping
            Value::String(s) => write!(f, "\"{s}\""),
            Value::NativeProcedure(p) => write!(f, "#<builtin:{}>", p.name),
            Value::Procedure(p) => match &p.name {
                Some(name) => write!(f, "#<procedure:{name}>"),
                None => write!(f, "#<procedure>"),
            },
        }
    }
}

/// Structural equality. Procedures compare by allocation.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => {
                Rc::ptr_eq(a, b) || (a.car == b.car && a.cdr == b.cdr)
            }
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::NativeProcedure(a), Value::NativeProcedure(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($($int_type:ty),*) => {
        $(
            impl From<$int_type> for Value {
                fn from(n: $int_type) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

/// Helper function for creating symbols in mixed lists
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Nil
}
