//! Large decimal numbers for idle economies.
//!
//! [`BigNumber`] wraps a 128-bit [`fastnum`] decimal (about 38 significant
//! digits, exponents up to roughly ±32 000). NaN is part of the value space:
//! division by zero yields NaN instead of failing, any non-finite result
//! collapses to NaN, and NaN is absorbing for every arithmetic operation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use fastnum::D128;
use fastnum::decimal::Context;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Every wrapped decimal carries this context so that overflow and division
/// by zero produce special values instead of panicking in debug builds.
const QUIET: Context = Context::default().without_traps();

/// A large decimal number with a NaN sentinel.
#[derive(Clone, Copy)]
pub struct BigNumber(D128);

impl BigNumber {
    pub const ZERO: BigNumber = BigNumber(D128::ZERO.with_ctx(QUIET));
    pub const ONE: BigNumber = BigNumber(D128::ONE.with_ctx(QUIET));
    pub const NAN: BigNumber = BigNumber(D128::NAN.with_ctx(QUIET));

    fn wrap(d: D128) -> Self {
        if d.is_finite() {
            Self(d.with_ctx(QUIET))
        } else {
            Self::NAN
        }
    }

    /// Convert an `f64` through its shortest decimal form, so `0.1` becomes
    /// exactly one tenth. Infinite and NaN inputs become NaN.
    pub fn from_f64(v: f64) -> Self {
        if !v.is_finite() {
            return Self::NAN;
        }
        if v.fract() == 0.0 && v.abs() < 9.0e15 {
            return Self::wrap(D128::from_i64(v as i64));
        }
        D128::from_str(&format!("{v:e}"), QUIET).map_or(Self::NAN, Self::wrap)
    }

    /// Convert to `f64`. Magnitudes beyond `f64::MAX` become infinite; only
    /// use this for display and tests.
    pub fn to_f64(self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        self.0.to_f64()
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }

    pub fn is_zero(self) -> bool {
        !self.is_nan() && self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        !self.is_zero() && self.0.is_negative()
    }

    pub fn is_positive(self) -> bool {
        !self.is_zero() && self.0.is_positive()
    }

    pub fn abs(self) -> Self {
        if self.is_nan() {
            return self;
        }
        Self::wrap(self.0.abs())
    }

    /// Round toward negative infinity.
    pub fn floor(self) -> Self {
        if self.is_nan() {
            return self;
        }
        Self::wrap(self.0.floor())
    }

    /// The smaller of two numbers. NaN on either side yields NaN.
    pub fn min(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            None => Self::NAN,
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    /// The larger of two numbers. NaN on either side yields NaN.
    pub fn max(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            None => Self::NAN,
            Some(Ordering::Less) => other,
            _ => self,
        }
    }

    /// Restrict to `[low, high]`.
    pub fn clamp(self, low: Self, high: Self) -> Self {
        self.max(low).min(high)
    }

    fn binary(self, rhs: Self, op: fn(D128, D128) -> D128) -> Self {
        if self.is_nan() || rhs.is_nan() {
            return Self::NAN;
        }
        Self::wrap(op(self.0, rhs.0))
    }
}

impl Default for BigNumber {
    fn default() -> Self {
        Self::ZERO
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

impl PartialEq for BigNumber {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for BigNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        Some(self.0.cmp(&other.0))
    }
}

impl Hash for BigNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_zero() {
            D128::ZERO.hash(state);
        } else {
            self.0.hash(state);
        }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

impl Add for BigNumber {
    type Output = BigNumber;

    fn add(self, rhs: BigNumber) -> BigNumber {
        self.binary(rhs, |a, b| a + b)
    }
}

impl Sub for BigNumber {
    type Output = BigNumber;

    fn sub(self, rhs: BigNumber) -> BigNumber {
        self.binary(rhs, |a, b| a - b)
    }
}

impl Mul for BigNumber {
    type Output = BigNumber;

    fn mul(self, rhs: BigNumber) -> BigNumber {
        self.binary(rhs, |a, b| a * b)
    }
}

impl Div for BigNumber {
    type Output = BigNumber;

    /// Division by zero yields NaN.
    fn div(self, rhs: BigNumber) -> BigNumber {
        if rhs.is_zero() {
            return Self::NAN;
        }
        self.binary(rhs, |a, b| a / b)
    }
}

impl Neg for BigNumber {
    type Output = BigNumber;

    fn neg(self) -> BigNumber {
        if self.is_nan() || self.is_zero() {
            return self;
        }
        Self::wrap(self.0.neg())
    }
}

impl AddAssign for BigNumber {
    fn add_assign(&mut self, rhs: BigNumber) {
        *self = *self + rhs;
    }
}

impl SubAssign for BigNumber {
    fn sub_assign(&mut self, rhs: BigNumber) {
        *self = *self - rhs;
    }
}

impl MulAssign for BigNumber {
    fn mul_assign(&mut self, rhs: BigNumber) {
        *self = *self * rhs;
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<f64> for BigNumber {
    fn from(v: f64) -> Self {
        Self::from_f64(v)
    }
}

impl From<i32> for BigNumber {
    fn from(v: i32) -> Self {
        Self::wrap(D128::from_i32(v))
    }
}

impl From<u32> for BigNumber {
    fn from(v: u32) -> Self {
        Self::wrap(D128::from_u32(v))
    }
}

impl From<i64> for BigNumber {
    fn from(v: i64) -> Self {
        Self::wrap(D128::from_i64(v))
    }
}

impl From<u64> for BigNumber {
    fn from(v: u64) -> Self {
        Self::wrap(D128::from_u64(v))
    }
}

/// Error returned when a string is not a valid number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid number literal: {0:?}")]
pub struct ParseBigNumberError(pub String);

impl FromStr for BigNumber {
    type Err = ParseBigNumberError;

    /// Accepts plain decimals (`"12.5"`), scientific notation (`"1.5e3000"`),
    /// and `"NaN"`. Infinities are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("nan") {
            return Ok(Self::NAN);
        }
        let invalid = || ParseBigNumberError(s.to_string());
        let parsed = D128::from_str(trimmed, QUIET).map_err(|_| invalid())?;
        if !parsed.is_finite() {
            return Err(invalid());
        }
        Ok(Self::wrap(parsed))
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            write!(f, "NaN")
        } else if self.is_zero() {
            write!(f, "0")
        } else {
            write!(f, "{}", self.0.reduce())
        }
    }
}

impl fmt::Debug for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigNumber({self})")
    }
}

// ---------------------------------------------------------------------------
// Serde: written as a string so large exponents survive any data format; read
// from either a number or a string.
// ---------------------------------------------------------------------------

impl serde::Serialize for BigNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl<'de> serde::Deserialize<'de> for BigNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match NumberRepr::deserialize(deserializer)? {
            NumberRepr::Int(v) => Ok(BigNumber::from(v)),
            NumberRepr::Float(v) => Ok(BigNumber::from_f64(v)),
            NumberRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
