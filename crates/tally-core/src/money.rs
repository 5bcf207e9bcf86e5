//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  A shift total built from hundreds of orders must equal the sum of     │
//! │  its orders to the cent, or the settlement shows a phantom variance.   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is an i64 of minor units, rounding happens in exactly  │
//! │    one place (percentage) and remainders are distributed explicitly.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(350);
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 1050);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::BPS_SCALE;

/// A monetary value in the smallest currency unit.
///
/// Signed so that reversals (voids) and variances can be expressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(12, 50).cents(), 1250);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half away from zero.
    ///
    /// ## Implementation
    /// Integer math on i128: `(amount * bps ± 5000) / 10000`.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// // 15% of 12.35 = 1.8525 → 1.85
    /// assert_eq!(Money::from_cents(1235).percentage(1500).cents(), 185);
    /// // 12.5% of 1.00 = 0.125 → 0.13
    /// assert_eq!(Money::from_cents(100).percentage(1250).cents(), 13);
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        let scale = BPS_SCALE as i128;
        let raw = self.0 as i128 * bps as i128;
        let half = scale / 2;
        let rounded = if raw >= 0 {
            (raw + half) / scale
        } else {
            (raw - half) / scale
        };
        Money(rounded as i64)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Subtracts, clamping the result at zero.
    #[inline]
    pub fn saturating_sub_floor(self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(Money::from_cents(1000).percentage(1000).cents(), 100);
        assert_eq!(Money::from_cents(1000).percentage(825).cents(), 83);
        assert_eq!(Money::from_cents(999).percentage(5000).cents(), 500);
        assert_eq!(Money::from_cents(0).percentage(5000).cents(), 0);
    }

    #[test]
    fn test_percentage_negative_is_symmetric() {
        let pos = Money::from_cents(999).percentage(5000);
        let neg = Money::from_cents(-999).percentage(5000);
        assert_eq!(pos.cents(), -neg.cents());
    }

    #[test]
    fn test_min_and_floor() {
        let a = Money::from_cents(300);
        let b = Money::from_cents(500);
        assert_eq!(a.min(b), a);
        assert_eq!(a.saturating_sub_floor(b), Money::zero());
        assert_eq!(b.saturating_sub_floor(a).cents(), 200);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 50].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 400);
    }
}
