//! USD price strings <-> smallest-unit USDC amounts.
//!
//! Parsing is integer-only: the dollar string is split on the decimal point
//! and scaled by 10^6, so no amount ever rounds through a float.

use alloy::primitives::U256;

use crate::constants::USDC_DECIMALS;
use crate::error::UptoError;

/// Parse a human-readable USD price (e.g. `"$0.001"`, `"1,000.25"`) into
/// smallest USDC units. `$` and commas are stripped; anything else
/// non-numeric, including negative amounts, is rejected. Fractional digits
/// beyond the token's six decimals are truncated.
pub fn parse_usdc_amount(price: &str) -> Result<U256, UptoError> {
    let cleaned: String = price
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Err(UptoError::InvalidPayment(format!(
            "invalid price '{price}': no numeric content"
        )));
    }
    if !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(UptoError::InvalidPayment(format!(
            "invalid price '{price}': not a nonnegative decimal"
        )));
    }

    let decimals = USDC_DECIMALS as usize;
    let (integer_part, fractional_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if fractional_part.contains('.') {
        return Err(UptoError::InvalidPayment(format!(
            "invalid price '{price}': multiple decimal points"
        )));
    }

    let integer: U256 = if integer_part.is_empty() {
        U256::ZERO
    } else {
        integer_part
            .parse::<U256>()
            .map_err(|e| UptoError::InvalidPayment(format!("invalid price '{price}': {e}")))?
    };

    // Pad or truncate the fractional part to exactly six digits.
    let frac_digits: String = fractional_part.chars().take(decimals).collect();
    let fractional: u64 = if frac_digits.is_empty() {
        0
    } else {
        let padded = format!("{frac_digits:0<decimals$}");
        padded
            .parse::<u64>()
            .map_err(|e| UptoError::InvalidPayment(format!("invalid price '{price}': {e}")))?
    };

    let multiplier = U256::from(10u64.pow(USDC_DECIMALS));
    integer
        .checked_mul(multiplier)
        .and_then(|scaled| scaled.checked_add(U256::from(fractional)))
        .ok_or_else(|| UptoError::InvalidPayment(format!("invalid price '{price}': overflow")))
}

/// Format a smallest-unit USDC amount as a dollar string rounded to the
/// nearest cent, e.g. `1000000` -> `"$1.00"`.
pub fn format_usdc_amount(units: U256) -> String {
    // Half-up rounding to cents: one cent is 10^4 units.
    let cents = units.saturating_add(U256::from(5_000u64)) / U256::from(10_000u64);
    let dollars = cents / U256::from(100u64);
    let rem = (cents % U256::from(100u64)).to::<u64>();
    format!("${dollars}.{rem:02}")
}
