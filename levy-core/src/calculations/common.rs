//! Common arithmetic shared by the cascade and the presentation layer.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero, matching how amounts
/// are shown on GRA returns and receipts.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use levy_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies a percentage rate (out of 100) to `base`, without rounding.
/// `None` when the product does not fit in a [`Decimal`].
///
/// ```
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
/// use levy_core::calculations::common::percent_of;
///
/// assert_eq!(percent_of(dec!(50000), dec!(2.5)), Some(dec!(1250)));
/// assert_eq!(percent_of(Decimal::MAX, dec!(15)), None);
/// ```
pub fn percent_of(
    base: Decimal,
    rate: Decimal,
) -> Option<Decimal> {
    base.checked_mul(rate)?.checked_div(Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // round_half_up tests
    // =========================================================================

    #[test]
    fn round_half_up_rounds_down_below_midpoint() {
        assert_eq!(round_half_up(dec!(7950.004)), dec!(7950.00));
    }

    #[test]
    fn round_half_up_rounds_up_at_midpoint() {
        assert_eq!(round_half_up(dec!(0.125)), dec!(0.13));
    }

    #[test]
    fn round_half_up_handles_negative_values() {
        assert_eq!(round_half_up(dec!(-0.125)), dec!(-0.13));
    }

    #[test]
    fn round_half_up_handles_large_values() {
        assert_eq!(round_half_up(dec!(999999.999)), dec!(1000000.00));
    }

    // =========================================================================
    // percent_of tests
    // =========================================================================

    #[test]
    fn percent_of_keeps_full_precision() {
        assert_eq!(percent_of(dec!(333.33), dec!(2.5)), Some(dec!(8.33325)));
    }

    #[test]
    fn percent_of_zero_rate_is_zero() {
        assert_eq!(percent_of(dec!(50000), Decimal::ZERO), Some(Decimal::ZERO));
    }

    #[test]
    fn percent_of_fractional_rate() {
        assert_eq!(percent_of(dec!(53000), dec!(15)), Some(dec!(7950)));
    }

    #[test]
    fn percent_of_overflow_is_none() {
        assert_eq!(percent_of(Decimal::MAX, dec!(2.5)), None);
    }
}
