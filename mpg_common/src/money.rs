use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "INR";
pub const CURRENCY_CODE_LOWER: &str = "inr";

/// Number of minor units (paise) in one major unit (rupee).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Rates are carried as basis points. 100 bp = 1%, so 10,000 bp = 100%.
pub const BASIS_POINTS: i64 = 10_000;

//--------------------------------------       Money         ---------------------------------------------------------
/// A currency amount in minor units (paise). All monetary arithmetic in the engine happens on this
/// type. It is a transparent `i64`, so it maps directly onto an INTEGER column, and there is no
/// floating point anywhere near it.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let v = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", v / MINOR_PER_MAJOR as u64, v % MINOR_PER_MAJOR as u64)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// An amount of whole major units (rupees).
    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Applies a rate given in basis points, rounding half-up to the minor unit.
    ///
    /// The intermediate product is taken in `i128`, so any representable amount times any sane
    /// rate cannot overflow. Identical inputs always produce identical outputs.
    pub fn percent_of(&self, rate_bp: i64) -> Money {
        let numer = i128::from(self.0) * i128::from(rate_bp);
        let denom = i128::from(BASIS_POINTS);
        let half = denom / 2;
        let rounded = if numer >= 0 { (numer + half) / denom } else { -((-numer + half) / denom) };
        #[allow(clippy::cast_possible_truncation)]
        Money(rounded as i64)
    }
}

/// Converts a whole-number percentage into basis points.
pub fn bp_from_percent(percent: i64) -> i64 {
    percent * 100
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from(100_000).to_string(), "1000.00");
        assert_eq!(Money::from(931_00).to_string(), "931.00");
        assert_eq!(Money::from(5).to_string(), "0.05");
        assert_eq!(Money::from(-50).to_string(), "-0.50");
    }

    #[test]
    fn percent_of_rounds_half_up() {
        // 0.10 at 5% is 0.005, which rounds up to a single minor unit
        assert_eq!(Money::from(10).percent_of(bp_from_percent(5)), Money::from(1));
        // 0.09 at 5% is 0.0045, which rounds down
        assert_eq!(Money::from(9).percent_of(bp_from_percent(5)), Money::from(0));
        // 1000.00 at 5% = 50.00
        assert_eq!(Money::from_major(1000).percent_of(bp_from_percent(5)), Money::from_major(50));
    }

    #[test]
    fn percent_of_is_deterministic() {
        let gross = Money::from(123_457);
        let first = gross.percent_of(275);
        for _ in 0..100 {
            assert_eq!(gross.percent_of(275), first);
        }
    }

    #[test]
    fn sum_and_arithmetic() {
        let amounts = [Money::from(100), Money::from(250), Money::from(1)];
        assert_eq!(amounts.into_iter().sum::<Money>(), Money::from(351));
        assert_eq!(Money::from(500) - Money::from(200), Money::from(300));
        assert_eq!(-Money::from(42), Money::from(-42));
    }
}
