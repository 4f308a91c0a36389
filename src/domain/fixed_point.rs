//! 18-decimal fixed-point helpers.
//!
//! All on-chain quantities arrive as unsigned base-unit integers. The
//! helpers here scale, parse and render them without ever passing through
//! floating point, so displayed values agree digit-for-digit with the
//! contract's own integer arithmetic.

use alloy::primitives::{U256, U512};

use super::error::ValuationError;

/// Decimal places of the fixed-point scale used for values and probabilities.
pub const WAD_DECIMALS: u8 = 18;

/// 10^18, the fixed-point unit.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Fractional digits shown for the implied probability.
pub const PROBABILITY_DIGITS: u8 = 4;

/// Largest decimal count whose unit, 10^77, still fits in 256 bits.
pub const MAX_TOKEN_DECIMALS: u8 = 77;

/// Returns 10^exp. Callers keep `exp` at or below `MAX_TOKEN_DECIMALS`.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u8).pow(U256::from(exp))
}

/// Returns 10^exp at 512 bits.
pub fn pow10_wide(exp: u8) -> U512 {
    U512::from(10u8).pow(U512::from(exp))
}

/// Zero-extend a 256-bit integer to 512 bits.
pub fn widen(value: U256) -> U512 {
    let l = value.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

/// The low 256 bits of `value`, or `None` when the high half is set.
pub fn narrow(value: U512) -> Option<U256> {
    let l = value.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return None;
    }
    Some(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

/// Accept a token's reported `decimals()` only if its unit fits in 256 bits.
pub fn check_token_decimals(decimals: u8) -> Result<u8, ValuationError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(ValuationError::UnsupportedTokenDecimals(decimals));
    }
    Ok(decimals)
}

/// Render a fixed-point integer with `decimals` implied decimal places.
///
/// The fractional part is truncated (never rounded) to `max_fraction_digits`
/// and trailing zeros are trimmed, keeping at least one digit so whole
/// numbers read as `1.0`.
pub fn format_units(value: U256, decimals: u8, max_fraction_digits: u8) -> String {
    format_wide_units(widen(value), decimals, max_fraction_digits)
}

/// `format_units` for values that may exceed 256 bits.
pub fn format_wide_units(value: U512, decimals: u8, max_fraction_digits: u8) -> String {
    let decimals = decimals.min(MAX_TOKEN_DECIMALS);
    let unit = pow10_wide(decimals);
    let (whole, frac) = value.div_rem(unit);

    if decimals == 0 {
        return format!("{whole}.0");
    }

    let padded = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    let keep = max_fraction_digits.clamp(1, decimals) as usize;
    let mut digits = padded[..keep].trim_end_matches('0').to_string();
    if digits.is_empty() {
        digits.push('0');
    }

    format!("{whole}.{digits}")
}

/// Render an 18-decimal probability rounded half-up to four decimals.
///
/// `0.5 * 10^18` renders as `0.5000`; `10^18` renders as `1.0000`.
pub fn format_probability(probability: U256) -> String {
    let step = pow10(WAD_DECIMALS - PROBABILITY_DIGITS);
    let half = step / U256::from(2u8);
    let scaled = probability.saturating_add(half) / step;

    let (whole, frac) = scaled.div_rem(pow10(PROBABILITY_DIGITS));
    format!(
        "{whole}.{:0>width$}",
        frac.to_string(),
        width = PROBABILITY_DIGITS as usize
    )
}

/// Parse a non-negative base-unit integer from its decimal text form.
///
/// Signed, fractional, empty and non-numeric text is rejected rather than
/// coerced.
pub fn parse_base_units(field: &'static str, text: &str) -> Result<U256, ValuationError> {
    let text = text.trim();
    let invalid = |reason: &str| ValuationError::InvalidInput {
        field,
        reason: reason.to_string(),
    };

    if text.is_empty() {
        return Err(invalid("value is empty"));
    }
    if text.starts_with('-') {
        return Err(invalid("value must be non-negative"));
    }
    if text.contains('.') {
        return Err(invalid("value must be a whole number of base units"));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("value is not a decimal integer"));
    }

    U256::from_str_radix(text, 10).map_err(|_| invalid("value does not fit in 256 bits"))
}
