//! Exact rational numbers.
//!
//! [`Number`] wraps a [`BigRational`], which normalizes on construction: the
//! numerator and denominator are coprime, the denominator is positive, and an
//! integer always has denominator 1. There is no way to build a non-canonical
//! value through this type.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use nom::{
    IResult, Parser,
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, preceded},
};
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::Error;

/// Smallest and largest radix accepted by [`Number::to_string_radix`].
pub const MIN_RADIX: u32 = 2;
pub const MAX_RADIX: u32 = 62;

/// Digits for radixes above 36, where case tells digits apart
const WIDE_DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Number(BigRational);

/// Split number text into its signed numerator and optional denominator digits.
fn rational_text(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    all_consuming(pair(
        recognize(pair(opt(char('-')), digit1)),
        opt(preceded(char('/'), digit1)),
    ))
    .parse(input)
}

impl Number {
    pub fn zero() -> Self {
        Number(BigRational::zero())
    }

    pub fn one() -> Self {
        Number(BigRational::one())
    }

    pub fn from_integer(n: impl Into<BigInt>) -> Self {
        Number(BigRational::from_integer(n.into()))
    }

    /// Build `numerator/denominator`, reduced. Fails on a zero denominator.
    pub fn from_ratio(
        numerator: impl Into<BigInt>,
        denominator: impl Into<BigInt>,
    ) -> Result<Self, Error> {
        let denominator = denominator.into();
        if denominator.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Number(BigRational::new(numerator.into(), denominator)))
    }

    /// Parse the textual forms `-?digits` and `-?digits/digits`.
    ///
    /// Returns `None` for anything else, including a zero denominator; the
    /// parser turns that into an invalid-number error.
    pub fn parse(text: &str) -> Option<Self> {
        let (_, (numerator, denominator)) = rational_text(text).ok()?;
        let numerator: BigInt = numerator.parse().ok()?;
        match denominator {
            None => Some(Number::from_integer(numerator)),
            Some(digits) => {
                let denominator: BigInt = digits.parse().ok()?;
                Number::from_ratio(numerator, denominator).ok()
            }
        }
    }

    pub fn numerator(&self) -> &BigInt {
        self.0.numer()
    }

    pub fn denominator(&self) -> &BigInt {
        self.0.denom()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn checked_div(&self, other: &Number) -> Result<Number, Error> {
        if other.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Number(&self.0 / &other.0))
    }

    pub fn recip(&self) -> Result<Number, Error> {
        if self.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Number(self.0.recip()))
    }

    pub fn compare(&self, other: &Number) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// The value as a `u32` when it is a whole number that fits.
    pub fn to_u32(&self) -> Option<u32> {
        if self.is_integer() {
            self.numerator().to_u32()
        } else {
            None
        }
    }

    /// Render in the given radix: a bare integer when the denominator is 1,
    /// otherwise `numerator/denominator`.
    ///
    /// Up to radix 36 digits above 9 are lowercase letters. Beyond that they run
    /// `0-9`, then `A-Z`, then `a-z`.
    pub fn to_string_radix(&self, radix: u32) -> Result<String, Error> {
        if !(MIN_RADIX..=MAX_RADIX).contains(&radix) {
            return Err(Error::EvalError(format!(
                "unsupported radix {radix} (expected {MIN_RADIX} to {MAX_RADIX})"
            )));
        }
        let numerator = integer_text(self.numerator(), radix);
        if self.is_integer() {
            Ok(numerator)
        } else {
            let denominator = integer_text(self.denominator(), radix);
            Ok(format!("{numerator}/{denominator}"))
        }
    }
}

/// `n` in `radix`, which must already be within `MIN_RADIX..=MAX_RADIX`.
fn integer_text(n: &BigInt, radix: u32) -> String {
    if radix <= 36 {
        return n.to_str_radix(radix);
    }

    let (sign, digits) = n.to_radix_be(radix);
    let mut text = String::with_capacity(digits.len() + 1);
    if sign == Sign::Minus {
        text.push('-');
    }
    for digit in digits {
        text.push(char::from(WIDE_DIGITS[usize::from(digit)]));
    }
    text
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numerator())
        } else {
            write!(f, "{}/{}", self.numerator(), self.denominator())
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

macro_rules! impl_binary_op {
    ($trait_name:ident, $method:ident, $op:tt) => {
        impl $trait_name for &Number {
            type Output = Number;

            fn $method(self, other: &Number) -> Number {
                Number(&self.0 $op &other.0)
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);
impl_binary_op!(Mul, mul, *);

impl Neg for &Number {
    type Output = Number;

    fn neg(self) -> Number {
        Number(-&self.0)
    }
}

macro_rules! impl_from_integer {
    ($($int_type:ty),*) => {
        $(
            impl From<$int_type> for Number {
                fn from(n: $int_type) -> Self {
                    Number::from_integer(n)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn ratio(n: i64, d: i64) -> Number {
        Number::from_ratio(n, d).unwrap()
    }

    #[test]
    fn test_parse_canonicalizes() {
        let cases = vec![
            ("4/2", Some("2")),
            ("2/4", Some("1/2")),
            ("-6/4", Some("-3/2")),
            ("0/5", Some("0")),
            ("-0", Some("0")),
            ("007", Some("7")),
            ("42", Some("42")),
            (
                "123456789012345678901234567890",
                Some("123456789012345678901234567890"),
            ),
            ("1/0", None),
            ("1.5", None),
            ("1.", None),
            ("1/2/3", None),
            ("1/", None),
            ("/2", None),
            ("-", None),
            ("", None),
            ("--1", None),
        ];

        for (i, (input, expected)) in cases.iter().enumerate() {
            let parsed = Number::parse(input).map(|n| n.to_string());
            assert_eq!(parsed.as_deref(), *expected, "case #{} ({input:?})", i + 1);
        }
    }

    #[test]
    fn test_canonical_parts() {
        let n = ratio(6, -4);
        assert_eq!(n.numerator(), &BigInt::from(-3));
        assert_eq!(n.denominator(), &BigInt::from(2));

        let whole = ratio(10, 5);
        assert!(whole.is_integer());
        assert_eq!(whole.denominator(), &BigInt::from(1));
    }

    #[test]
    fn test_arithmetic() {
        let half = ratio(1, 2);
        let third = ratio(1, 3);

        assert_eq!(&half + &third, ratio(5, 6));
        assert_eq!(&half - &third, ratio(1, 6));
        assert_eq!(&half * &third, ratio(1, 6));
        assert_eq!(half.checked_div(&third).unwrap(), ratio(3, 2));
        assert_eq!(-&half, ratio(-1, 2));
        assert_eq!(ratio(-2, 3).recip().unwrap(), ratio(-3, 2));
        assert_eq!(&half + &half, Number::one());
        assert!((&half - &half).is_integer());
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            Number::one().checked_div(&Number::zero()),
            Err(Error::DivisionByZero)
        );
        assert_eq!(Number::zero().recip(), Err(Error::DivisionByZero));
        assert_eq!(Number::from_ratio(1, 0), Err(Error::DivisionByZero));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(ratio(1, 3).compare(&ratio(1, 2)), Ordering::Less);
        assert_eq!(ratio(2, 4).compare(&ratio(1, 2)), Ordering::Equal);
        assert_eq!(ratio(-1, 2).compare(&Number::zero()), Ordering::Less);
    }

    #[test]
    fn test_to_string_radix() {
        let cases = vec![
            (Number::from(10), 2, "1010"),
            (Number::from(255), 16, "ff"),
            (Number::from(-255), 16, "-ff"),
            (ratio(1, 2), 10, "1/2"),
            (ratio(3, 4), 2, "11/100"),
            (Number::from(35), 36, "z"),
            (Number::zero(), 7, "0"),
            (Number::from(36), 37, "A"),
            (Number::from(61), 62, "z"),
            (Number::from(62), 62, "10"),
            (Number::from(-100), 62, "-1c"),
            (Number::zero(), 62, "0"),
            (ratio(1, 61), 62, "1/z"),
            (ratio(-37, 38), 40, "-b/c"),
        ];

        for (i, (number, radix, expected)) in cases.iter().enumerate() {
            assert_eq!(
                number.to_string_radix(*radix).unwrap(),
                *expected,
                "case #{}",
                i + 1
            );
        }

        assert!(Number::from(10).to_string_radix(1).is_err());
        assert!(Number::from(10).to_string_radix(63).is_err());
    }

    #[test]
    fn test_to_u32() {
        assert_eq!(Number::from(16).to_u32(), Some(16));
        assert_eq!(ratio(1, 2).to_u32(), None);
        assert_eq!(Number::from(-2).to_u32(), None);
    }
}
