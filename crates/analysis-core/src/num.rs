//! Numeric abstraction shared by every analysis component.
//!
//! Prices flow through the engine as an injectable numeric type so the same
//! code runs on plain `f64` or on fixed-point decimals. Both representations
//! carry an explicit "not a number" value that propagates through arithmetic.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::str::FromStr;

/// Arithmetic capability required from a price type.
pub trait Num:
    Copy
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn nan() -> Self;
    fn zero() -> Self;
    fn one() -> Self;
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
    fn is_nan(self) -> bool;
    fn abs(self) -> Self;

    fn from_usize(value: usize) -> Self {
        Self::from_f64(value as f64)
    }

    /// True for finite, non-NaN values.
    fn is_valid(self) -> bool {
        !self.is_nan() && self.to_f64().is_finite()
    }

    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    /// Larger of two values; NaN if either side is NaN.
    fn maximum(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        if other > self {
            other
        } else {
            self
        }
    }

    /// Smaller of two values; NaN if either side is NaN.
    fn minimum(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        if other < self {
            other
        } else {
            self
        }
    }
}

impl Num for f64 {
    fn nan() -> Self {
        f64::NAN
    }

    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }
}

/// Fixed-point decimal with an explicit NaN sentinel.
///
/// Overflow and division by zero produce NaN instead of panicking, matching the
/// propagation behaviour of `f64`.
#[derive(Clone, Copy)]
pub struct DecimalNum(Option<Decimal>);

impl DecimalNum {
    pub const NAN: DecimalNum = DecimalNum(None);

    pub fn new(value: Decimal) -> Self {
        DecimalNum(Some(value))
    }

    pub fn value(self) -> Option<Decimal> {
        self.0
    }

    fn combine(self, rhs: Self, op: impl FnOnce(Decimal, Decimal) -> Option<Decimal>) -> Self {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => DecimalNum(op(a, b)),
            _ => DecimalNum::NAN,
        }
    }
}

impl From<Decimal> for DecimalNum {
    fn from(value: Decimal) -> Self {
        DecimalNum::new(value)
    }
}

impl FromStr for DecimalNum {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("nan") {
            return Ok(DecimalNum::NAN);
        }
        Decimal::from_str(s).map(DecimalNum::new)
    }
}

impl PartialEq for DecimalNum {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for DecimalNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

impl Debug for DecimalNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "DecimalNum({})", d),
            None => write!(f, "DecimalNum(NaN)"),
        }
    }
}

impl Display for DecimalNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "NaN"),
        }
    }
}

impl Add for DecimalNum {
    type Output = DecimalNum;

    fn add(self, rhs: Self) -> Self::Output {
        self.combine(rhs, |a, b| a.checked_add(b))
    }
}

impl Sub for DecimalNum {
    type Output = DecimalNum;

    fn sub(self, rhs: Self) -> Self::Output {
        self.combine(rhs, |a, b| a.checked_sub(b))
    }
}

impl Mul for DecimalNum {
    type Output = DecimalNum;

    fn mul(self, rhs: Self) -> Self::Output {
        self.combine(rhs, |a, b| a.checked_mul(b))
    }
}

impl Div for DecimalNum {
    type Output = DecimalNum;

    fn div(self, rhs: Self) -> Self::Output {
        // checked_div returns None for a zero divisor
        self.combine(rhs, |a, b| a.checked_div(b))
    }
}

impl Neg for DecimalNum {
    type Output = DecimalNum;

    fn neg(self) -> Self::Output {
        DecimalNum(self.0.map(|d| -d))
    }
}

impl Num for DecimalNum {
    fn nan() -> Self {
        DecimalNum::NAN
    }

    fn zero() -> Self {
        DecimalNum::new(Decimal::ZERO)
    }

    fn one() -> Self {
        DecimalNum::new(Decimal::ONE)
    }

    fn from_f64(value: f64) -> Self {
        DecimalNum(Decimal::from_f64(value))
    }

    fn from_usize(value: usize) -> Self {
        DecimalNum(Decimal::from_usize(value))
    }

    fn to_f64(self) -> f64 {
        self.0.and_then(|d| d.to_f64()).unwrap_or(f64::NAN)
    }

    fn is_nan(self) -> bool {
        self.0.is_none()
    }

    fn abs(self) -> Self {
        DecimalNum(self.0.map(|d| d.abs()))
    }

    fn is_valid(self) -> bool {
        self.0.is_some()
    }
}

impl Serialize for DecimalNum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(d) => rust_decimal::serde::float::serialize(&d, serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for DecimalNum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<Decimal>::deserialize(deserializer).map(DecimalNum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_division_by_zero_is_nan() {
        let a = DecimalNum::new(dec!(10));
        let z = DecimalNum::zero();
        assert!((a / z).is_nan());
        assert!(!(a / z).is_valid());
    }

    #[test]
    fn test_json_roundtrip() {
        let price = DecimalNum::new(dec!(1.5));
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "1.5");
        let back: DecimalNum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);

        assert_eq!(serde_json::to_string(&DecimalNum::NAN).unwrap(), "null");
        let missing: DecimalNum = serde_json::from_str("null").unwrap();
        assert!(missing.is_nan());

        let prices = vec![DecimalNum::new(dec!(40800)), DecimalNum::NAN];
        assert_eq!(serde_json::to_string(&prices).unwrap(), "[40800.0,null]");
    }

    #[test]
    fn test_nan_propagates() {
        let a = DecimalNum::new(dec!(1.5));
        assert!((a + DecimalNum::NAN).is_nan());
        assert!((a * DecimalNum::nan()).is_nan());
        assert!(f64::nan().is_nan());
        assert!((1.0_f64 + f64::nan()).is_nan());
    }

    #[test]
    fn test_nan_is_not_equal_to_itself() {
        assert_ne!(DecimalNum::NAN, DecimalNum::NAN);
        assert!(DecimalNum::NAN.partial_cmp(&DecimalNum::one()).is_none());
    }

    #[test]
    fn test_conversions() {
        let d = DecimalNum::from_f64(0.618);
        assert!((d.to_f64() - 0.618).abs() < 1e-12);
        assert!(DecimalNum::from_f64(f64::NAN).is_nan());
        assert!(DecimalNum::from_f64(f64::INFINITY).is_nan());
        assert_eq!(DecimalNum::from_usize(7), DecimalNum::new(dec!(7)));
        assert_eq!("NaN".parse::<DecimalNum>().map(|d| d.is_nan()).ok(), Some(true));
    }

    #[test]
    fn test_maximum_minimum() {
        assert_eq!(3.0_f64.maximum(5.0), 5.0);
        assert_eq!(3.0_f64.minimum(5.0), 3.0);
        assert!(3.0_f64.maximum(f64::NAN).is_nan());
        let a = DecimalNum::new(dec!(-2));
        assert_eq!(a.abs(), DecimalNum::new(dec!(2)));
        assert_eq!(a.maximum(DecimalNum::one()), DecimalNum::one());
    }

    #[test]
    fn test_f64_infinity_is_not_valid() {
        assert!(!f64::INFINITY.is_valid());
        assert!(2.5_f64.is_valid());
    }
}
