//! Commission calculator.
//!
//! Pure fixed-point arithmetic on minor units.  The freelancer share is
//! always `amount - commission`, never rounded on its own, so the split
//! invariant `commission + freelancer == amount` holds exactly.

use crate::errors::{LedgerError, Result};

/// Default platform commission: 10.00%.
pub const DEFAULT_RATE_BPS: i64 = 1000;
/// Reduced commission for promoted SuperFreelancers: 7.50%.
pub const SUPER_RATE_BPS: i64 = 750;

/// One whole, in basis points.
const BPS_SCALE: i64 = 10_000;

/// Result of splitting a payment between platform and freelancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub commission_minor: i64,
    pub freelancer_minor: i64,
}

/// Split `amount_minor` at `rate_bps`, rounding the commission half-up to
/// the nearest minor unit.
pub fn compute_split(amount_minor: i64, rate_bps: i64) -> Result<Split> {
    if !(0..=BPS_SCALE).contains(&rate_bps) {
        return Err(LedgerError::InvalidRate(rate_bps));
    }
    if amount_minor <= 0 {
        return Err(LedgerError::InvalidAmount(amount_minor));
    }

    // i128 intermediate: amount * rate cannot overflow before the divide.
    let commission_minor =
        ((amount_minor as i128 * rate_bps as i128 + (BPS_SCALE as i128 / 2)) / BPS_SCALE as i128)
            as i64;

    Ok(Split {
        commission_minor,
        freelancer_minor: amount_minor - commission_minor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_scenario() {
        // 1000.00 at 10.0% → 100.00 / 900.00
        let split = compute_split(100_000, DEFAULT_RATE_BPS).unwrap();
        assert_eq!(split.commission_minor, 10_000);
        assert_eq!(split.freelancer_minor, 90_000);
    }

    #[test]
    fn super_freelancer_rate_scenario() {
        // 1000.00 at 7.5% → 75.00 / 925.00
        let split = compute_split(100_000, SUPER_RATE_BPS).unwrap();
        assert_eq!(split.commission_minor, 7_500);
        assert_eq!(split.freelancer_minor, 92_500);
    }

    #[test]
    fn rounds_half_up() {
        // 33 * 750 / 10000 = 2.475 → 2.
        assert_eq!(compute_split(33, SUPER_RATE_BPS).unwrap().commission_minor, 2);
        // 2 * 750 / 10000 = 0.15 → 0;  7 * 750 / 10000 = 0.525 → 1.
        assert_eq!(compute_split(2, SUPER_RATE_BPS).unwrap().commission_minor, 0);
        assert_eq!(compute_split(7, SUPER_RATE_BPS).unwrap().commission_minor, 1);
        // Exactly half a minor unit rounds up: 50 * 100 / 10000 = 0.5 → 1.
        assert_eq!(compute_split(50, 100).unwrap().commission_minor, 1);
    }

    #[test]
    fn split_invariant_holds_across_range() {
        for amount in [1, 7, 99, 101, 12_345, 999_999_999, i64::MAX / 2] {
            for rate in [0, 1, 333, 750, 1000, 4999, 9999, 10_000] {
                let split = compute_split(amount, rate).unwrap();
                assert_eq!(
                    split.commission_minor + split.freelancer_minor,
                    amount,
                    "invariant broken at amount={amount} rate={rate}"
                );
                assert!(split.commission_minor >= 0);
                assert!(split.freelancer_minor >= 0);
            }
        }
    }

    #[test]
    fn boundary_rates() {
        let split = compute_split(100_000, 0).unwrap();
        assert_eq!(split.commission_minor, 0);
        assert_eq!(split.freelancer_minor, 100_000);

        let split = compute_split(100_000, 10_000).unwrap();
        assert_eq!(split.commission_minor, 100_000);
        assert_eq!(split.freelancer_minor, 0);
    }

    #[test]
    fn out_of_range_rate_rejected() {
        assert!(matches!(
            compute_split(100_000, -1),
            Err(LedgerError::InvalidRate(-1))
        ));
        assert!(matches!(
            compute_split(100_000, 10_001),
            Err(LedgerError::InvalidRate(10_001))
        ));
    }

    #[test]
    fn non_positive_amount_rejected() {
        assert!(matches!(
            compute_split(0, DEFAULT_RATE_BPS),
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            compute_split(-500, DEFAULT_RATE_BPS),
            Err(LedgerError::InvalidAmount(-500))
        ));
    }
}
