//! The split calculator.
//!
//! Decomposes one order item's gross amount into platform commission, GST on that commission, TDS,
//! and the seller's net amount. Pure arithmetic on [`Money`]; no I/O, no clock, no randomness.

use mpg_common::{Money, BASIS_POINTS};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("Gross amount must be positive, got {0}")]
    NonPositiveGross(Money),
    #[error("{name} rate must lie in [0, {BASIS_POINTS}] basis points, got {value}")]
    RateOutOfRange { name: &'static str, value: i64 },
}

/// The fee rates applied to an order item, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRates {
    pub commission_bp: i64,
    pub gst_bp: i64,
    pub tds_bp: i64,
}

impl FeeRates {
    pub fn new(commission_bp: i64, gst_bp: i64, tds_bp: i64) -> Self {
        Self { commission_bp, gst_bp, tds_bp }
    }

    fn validate(&self) -> Result<(), SplitError> {
        for (name, value) in [
            ("commission", self.commission_bp),
            ("GST", self.gst_bp),
            ("TDS", self.tds_bp),
        ] {
            if !(0..=BASIS_POINTS).contains(&value) {
                return Err(SplitError::RateOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// The result of splitting one gross amount.
///
/// Invariant: `commission + gst_on_commission + tds_deducted + net_seller_amount == gross_amount`,
/// exactly. The net amount is derived by subtraction, so the identity cannot drift under rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitAmounts {
    pub gross_amount: Money,
    pub commission: Money,
    pub gst_on_commission: Money,
    pub tds_deducted: Money,
    pub net_seller_amount: Money,
}

/// Computes the split for a single order item.
///
/// Each component is rounded half-up to the minor unit independently:
/// commission from the gross, GST from the commission, TDS from the gross (zero when the seller is
/// TDS-exempt). The seller's net is the exact remainder.
pub fn compute_split(gross: Money, rates: FeeRates, tds_exempt: bool) -> Result<SplitAmounts, SplitError> {
    if !gross.is_positive() {
        return Err(SplitError::NonPositiveGross(gross));
    }
    rates.validate()?;
    let commission = gross.percent_of(rates.commission_bp);
    let gst_on_commission = commission.percent_of(rates.gst_bp);
    let tds_deducted = if tds_exempt { Money::zero() } else { gross.percent_of(rates.tds_bp) };
    let net_seller_amount = gross - commission - gst_on_commission - tds_deducted;
    Ok(SplitAmounts { gross_amount: gross, commission, gst_on_commission, tds_deducted, net_seller_amount })
}

#[cfg(test)]
mod test {
    use mpg_common::bp_from_percent;

    use super::*;

    fn standard_rates() -> FeeRates {
        FeeRates::new(bp_from_percent(5), bp_from_percent(18), bp_from_percent(1))
    }

    #[test]
    fn worked_example() {
        // gross 1000.00 at 5% commission, 18% GST, 1% TDS
        let split = compute_split(Money::from_major(1000), standard_rates(), false).unwrap();
        assert_eq!(split.commission, Money::from_major(50));
        assert_eq!(split.gst_on_commission, Money::from_major(9));
        assert_eq!(split.tds_deducted, Money::from_major(10));
        assert_eq!(split.net_seller_amount, Money::from_major(931));
    }

    #[test]
    fn components_always_sum_to_gross() {
        let rates = [
            standard_rates(),
            FeeRates::new(0, 0, 0),
            FeeRates::new(BASIS_POINTS, 0, 0),
            FeeRates::new(333, 1800, 75),
            FeeRates::new(1, 1, 1),
        ];
        for gross in [1, 2, 3, 7, 99, 100, 101, 999_999, 123_457, i64::from(u16::MAX)] {
            for r in rates {
                for exempt in [false, true] {
                    let s = compute_split(Money::from(gross), r, exempt).unwrap();
                    assert_eq!(
                        s.commission + s.gst_on_commission + s.tds_deducted + s.net_seller_amount,
                        s.gross_amount,
                        "identity broke for gross={gross} rates={r:?} exempt={exempt}"
                    );
                }
            }
        }
    }

    #[test]
    fn tds_exemption_zeroes_tds_only() {
        let with = compute_split(Money::from_major(1000), standard_rates(), false).unwrap();
        let without = compute_split(Money::from_major(1000), standard_rates(), true).unwrap();
        assert_eq!(without.tds_deducted, Money::zero());
        assert_eq!(without.commission, with.commission);
        assert_eq!(without.gst_on_commission, with.gst_on_commission);
        assert_eq!(without.net_seller_amount, with.net_seller_amount + with.tds_deducted);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            compute_split(Money::zero(), standard_rates(), false),
            Err(SplitError::NonPositiveGross(Money::zero()))
        );
        assert!(compute_split(Money::from(-100), standard_rates(), false).is_err());
        let too_high = FeeRates::new(BASIS_POINTS + 1, 0, 0);
        assert!(matches!(
            compute_split(Money::from(100), too_high, false),
            Err(SplitError::RateOutOfRange { name: "commission", .. })
        ));
        let negative = FeeRates::new(500, -1, 0);
        assert!(matches!(
            compute_split(Money::from(100), negative, false),
            Err(SplitError::RateOutOfRange { name: "GST", .. })
        ));
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        let a = compute_split(Money::from(123_457), standard_rates(), false).unwrap();
        let b = compute_split(Money::from(123_457), standard_rates(), false).unwrap();
        assert_eq!(a, b);
    }
}
