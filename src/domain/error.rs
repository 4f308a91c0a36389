//! Domain errors for the valuation core.

use thiserror::Error;

/// Reasons the derived-value calculation can refuse its inputs.
///
/// Degenerate markets (zero supply or zero collateral) are not errors;
/// they resolve to the 50/50 default instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    /// A raw integer input was missing a digit, signed, or fractional.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String,
    },

    /// Collateral tokens with more than 18 decimals cannot be normalized.
    #[error("collateral decimals {0} exceed the 18-decimal fixed-point scale")]
    DecimalsOutOfRange(u8),

    /// A token reported more decimals than a 256-bit unit can hold.
    #[error("token decimals {0} exceed the supported maximum of 77")]
    UnsupportedTokenDecimals(u8),
}

/// Errors produced when parsing a market pool identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolIdError {
    #[error("pool id is empty")]
    Empty,

    #[error("pool id contains non-hex characters: {0}")]
    InvalidHex(String),
}
