//! Display formatting for amounts and rates.

use rust_decimal::Decimal;

use crate::calculations::common::round_half_up;

/// Currency code used by every GRA return.
pub const GHANA_CEDI: &str = "GHS";

/// Formats `amount` as `"<code> 1,234.56"`, rounding half-up to two places.
///
/// ```
/// use rust_decimal_macros::dec;
/// use levy_core::currency::format_currency;
///
/// assert_eq!(format_currency(dec!(10950), "GHS"), "GHS 10,950.00");
/// assert_eq!(format_currency(dec!(-1234.565), "GHS"), "GHS -1,234.57");
/// ```
pub fn format_currency(
    amount: Decimal,
    code: &str,
) -> String {
    format!("{code} {}", format_amount(amount))
}

/// Formats `amount` with thousands separators and two decimal places.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = round_half_up(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

/// Formats a percentage rate without trailing zeros (`2.50` → `"2.5%"`).
pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", rate.normalize())
}
