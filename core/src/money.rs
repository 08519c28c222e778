//! Money value object and the two-decimal rounding rule.
//!
//! Amounts are held in minor units (paise) so that sums are exact. Values that
//! pass through a fractional stage (bundle discounts, percentage promos, tax)
//! are computed in `f64` and rounded with [`round2`] when they become `Money`
//! again. Client estimates use the same `f64` arithmetic, which is what makes
//! estimate and settlement agree to the paisa.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// Rounds to two decimal places, half away from zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// An amount of currency held in minor units (1/100 of the major unit).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates a `Money` value from whole major units.
    #[must_use]
    pub const fn from_major_units(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    /// Converts a decimal major-unit amount, rounding to the nearest minor unit
    /// (`round(amount * 100)`).
    ///
    /// Non-finite input yields `None`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bounded by the range check below
    pub fn from_major(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let minor = (amount * 100.0).round();
        if minor > i64::MAX as f64 || minor < i64::MIN as f64 {
            return None;
        }
        Some(Self(minor as i64))
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Amount in major units as a float, for fractional arithmetic.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // realistic amounts are far below 2^52 paise
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Multiplies by a factor and rounds back to the nearest minor unit.
    ///
    /// A non-finite product collapses to zero.
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self::from_major(round2(self.as_major() * factor)).unwrap_or(Self::ZERO)
    }

    /// `true` when the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `true` when the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Subtraction that never goes below zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let value = self.0.saturating_sub(other.0);
        if value < 0 { Self::ZERO } else { Self(value) }
    }

    /// Absolute difference between two amounts, saturating at the largest
    /// representable amount.
    #[must_use]
    pub fn abs_diff(self, other: Self) -> Self {
        Self(i64::try_from(self.0.abs_diff(other.0)).unwrap_or(i64::MAX))
    }

    /// The smaller of two amounts.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Ord::min(self, other)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
