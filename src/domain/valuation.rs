//! Derived outcome-token valuation.
//!
//! Reproduces the pricing contract's `getTokenValues` from raw collateral and
//! supply data so the client can still show values when that call fails:
//!
//! ```text
//! scaled      = total_collateral * 10^(18 - collateral_decimals)
//! yes_value   = scaled * 10^18 / yes_supply
//! no_value    = scaled * 10^18 / no_supply
//! probability = yes_value * 10^18 / (yes_value + no_value)
//! ```
//!
//! Every division truncates toward zero, matching Solidity. Products are
//! taken at 512 bits: `total_collateral * 10^12 * 10^18` fits there for any
//! 256-bit collateral, so no well-formed input overflows.

use alloy::primitives::{U256, U512};
use serde::{Deserialize, Serialize};

use super::error::ValuationError;
use super::fixed_point::{
    format_probability, format_wide_units, narrow, parse_base_units, pow10_wide, widen, WAD,
    WAD_DECIMALS,
};
use super::market::{DerivedValue, FixedTokenValues, MarketSnapshot, OutcomeSupplies};

/// Derived value triple at full width.
///
/// Values exceed 256 bits only for enormous collateral against tiny
/// supplies; the probability is bounded by `WAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideTokenValues {
    pub yes_value: U512,
    pub no_value: U512,
    pub yes_probability: U256,
}

impl WideTokenValues {
    /// The 256-bit triple the contract would return, if both values fit.
    pub fn narrow(&self) -> Option<FixedTokenValues> {
        Some(FixedTokenValues {
            yes_value: narrow(self.yes_value)?,
            no_value: narrow(self.no_value)?,
            yes_probability: self.yes_probability,
        })
    }
}

impl From<FixedTokenValues> for WideTokenValues {
    fn from(values: FixedTokenValues) -> Self {
        Self {
            yes_value: widen(values.yes_value),
            no_value: widen(values.no_value),
            yes_probability: values.yes_probability,
        }
    }
}

/// Outcome of the fixed-point stage of a valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    /// No meaningful ratio exists yet; the 50/50 prior applies.
    Degenerate,
    /// Both supplies and the collateral are positive.
    Priced(WideTokenValues),
}

/// Converts raw market state into per-outcome values and an implied
/// probability. Pure: identical inputs always yield identical outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedValueCalculator;

impl DerivedValueCalculator {
    pub const fn new() -> Self {
        Self
    }

    /// Compute the display-ready valuation.
    ///
    /// # Errors
    /// Fails only for collateral with more than 18 decimals, which cannot
    /// be normalized onto the 18-decimal scale.
    pub fn derive(
        &self,
        snapshot: &MarketSnapshot,
        supplies: &OutcomeSupplies,
    ) -> Result<DerivedValue, ValuationError> {
        match self.fixed_values(snapshot, supplies)? {
            Valuation::Degenerate => Ok(DerivedValue::degenerate()),
            Valuation::Priced(values) => Ok(Self::render_wide(&values, snapshot.collateral_decimals)),
        }
    }

    /// Compute the raw 18-decimal value triple.
    ///
    /// Zero supply on either side, or zero collateral with positive supplies,
    /// is degenerate rather than a division by zero.
    pub fn fixed_values(
        &self,
        snapshot: &MarketSnapshot,
        supplies: &OutcomeSupplies,
    ) -> Result<Valuation, ValuationError> {
        if snapshot.collateral_decimals > WAD_DECIMALS {
            return Err(ValuationError::DecimalsOutOfRange(snapshot.collateral_decimals));
        }
        if supplies.is_degenerate() || snapshot.total_collateral.is_zero() {
            return Ok(Valuation::Degenerate);
        }

        let wad = widen(WAD);
        let scaled_collateral =
            widen(snapshot.total_collateral) * pow10_wide(WAD_DECIMALS - snapshot.collateral_decimals);
        let numerator = scaled_collateral * wad;

        let yes_value = numerator / widen(supplies.yes_supply);
        let no_value = numerator / widen(supplies.no_supply);

        let total = yes_value + no_value;
        // Both quotients truncate to zero only for dust collateral against
        // enormous supplies; there is no ratio to report then either.
        if total.is_zero() {
            return Ok(Valuation::Degenerate);
        }
        // yes_value <= total, so the quotient is at most WAD.
        let yes_probability = narrow(yes_value * wad / total).unwrap_or(WAD);

        Ok(Valuation::Priced(WideTokenValues {
            yes_value,
            no_value,
            yes_probability,
        }))
    }

    /// Format a fixed-point triple, whether derived here or returned by the
    /// contract, at the collateral token's display precision.
    pub fn render(values: &FixedTokenValues, collateral_decimals: u8) -> DerivedValue {
        Self::render_wide(&WideTokenValues::from(*values), collateral_decimals)
    }

    fn render_wide(values: &WideTokenValues, collateral_decimals: u8) -> DerivedValue {
        let digits = collateral_decimals.min(WAD_DECIMALS);
        DerivedValue {
            yes_unit_value: format_wide_units(values.yes_value, WAD_DECIMALS, digits),
            no_unit_value: format_wide_units(values.no_value, WAD_DECIMALS, digits),
            yes_probability: format_probability(values.yes_probability),
        }
    }
}

/// Valuation inputs parsed from their textual base-unit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationInputs {
    pub snapshot: MarketSnapshot,
    pub supplies: OutcomeSupplies,
}

impl ValuationInputs {
    /// Parse the four scalar inputs, rejecting negative or fractional text.
    pub fn parse(
        total_collateral: &str,
        collateral_decimals: &str,
        yes_supply: &str,
        no_supply: &str,
    ) -> Result<Self, ValuationError> {
        let decimals = parse_base_units("collateral_decimals", collateral_decimals)?;
        let collateral_decimals = u8::try_from(decimals)
            .map_err(|_| ValuationError::InvalidInput {
                field: "collateral_decimals",
                reason: format!("{decimals} is not a valid token decimal count"),
            })?;

        Ok(Self {
            snapshot: MarketSnapshot {
                total_collateral: parse_base_units("total_collateral", total_collateral)?,
                collateral_decimals,
            },
            supplies: OutcomeSupplies {
                yes_supply: parse_base_units("yes_supply", yes_supply)?,
                no_supply: parse_base_units("no_supply", no_supply)?,
            },
        })
    }
}

/// Absolute per-field differences between two value triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    pub yes_value: U256,
    pub no_value: U256,
    pub yes_probability: U256,
}

impl Divergence {
    /// Per-field distance between the contract's triple and a derived one.
    /// Distances beyond 256 bits saturate at `U256::MAX`.
    pub fn between(direct: &FixedTokenValues, derived: &WideTokenValues) -> Self {
        let diff = |a: U512, b: U512| narrow(if a > b { a - b } else { b - a }).unwrap_or(U256::MAX);
        Self {
            yes_value: diff(widen(direct.yes_value), derived.yes_value),
            no_value: diff(widen(direct.no_value), derived.no_value),
            yes_probability: diff(widen(direct.yes_probability), widen(derived.yes_probability)),
        }
    }

    /// True when any field differs by more than `tolerance` base units.
    pub fn exceeds(&self, tolerance: U256) -> bool {
        self.yes_value > tolerance || self.no_value > tolerance || self.yes_probability > tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixed_point::pow10;

    fn e17(n: u64) -> U256 {
        U256::from(n) * pow10(17)
    }

    fn one_token_usdc() -> MarketSnapshot {
        MarketSnapshot {
            total_collateral: U256::from(1_000_000u64),
            collateral_decimals: 6,
        }
    }

    #[test]
    fn test_balanced_half_token_supplies() {
        let supplies = OutcomeSupplies { yes_supply: e17(5), no_supply: e17(5) };
        let value = DerivedValueCalculator::new().derive(&one_token_usdc(), &supplies).unwrap();

        assert_eq!(value.yes_unit_value, "2.0");
        assert_eq!(value.no_unit_value, "2.0");
        assert_eq!(value.yes_probability, "0.5000");
    }

    #[test]
    fn test_one_token_supply_each_values_one() {
        let supplies = OutcomeSupplies { yes_supply: WAD, no_supply: WAD };
        let value = DerivedValueCalculator::new().derive(&one_token_usdc(), &supplies).unwrap();

        assert_eq!(value.yes_unit_value, "1.0");
        assert_eq!(value.no_unit_value, "1.0");
        assert_eq!(value.yes_probability, "0.5000");
    }

    #[test]
    fn test_skewed_market() {
        let supplies = OutcomeSupplies { yes_supply: e17(3), no_supply: e17(7) };
        let value = DerivedValueCalculator::new().derive(&one_token_usdc(), &supplies).unwrap();

        assert_eq!(value.yes_unit_value, "3.333333");
        assert_eq!(value.no_unit_value, "1.428571");
        assert_eq!(value.yes_probability, "0.7000");
    }

    #[test]
    fn test_zero_yes_supply_is_degenerate() {
        let supplies = OutcomeSupplies { yes_supply: U256::ZERO, no_supply: e17(9) };
        let value = DerivedValueCalculator::new().derive(&one_token_usdc(), &supplies).unwrap();
        assert_eq!(value, DerivedValue::degenerate());
    }

    #[test]
    fn test_zero_collateral_is_degenerate() {
        let snapshot = MarketSnapshot { total_collateral: U256::ZERO, collateral_decimals: 6 };
        let supplies = OutcomeSupplies { yes_supply: e17(3), no_supply: e17(7) };
        let value = DerivedValueCalculator::new().derive(&snapshot, &supplies).unwrap();
        assert_eq!(value, DerivedValue::degenerate());
    }

    #[test]
    fn test_decimals_above_eighteen_rejected() {
        let snapshot = MarketSnapshot { total_collateral: U256::from(1u8), collateral_decimals: 19 };
        let supplies = OutcomeSupplies { yes_supply: WAD, no_supply: WAD };
        assert_eq!(
            DerivedValueCalculator::new().derive(&snapshot, &supplies),
            Err(ValuationError::DecimalsOutOfRange(19))
        );
    }

    #[test]
    fn test_max_collateral_still_priced() {
        let snapshot = MarketSnapshot { total_collateral: U256::MAX, collateral_decimals: 6 };
        let supplies = OutcomeSupplies { yes_supply: WAD, no_supply: WAD };
        let calc = DerivedValueCalculator::new();

        let Valuation::Priced(values) = calc.fixed_values(&snapshot, &supplies).unwrap() else {
            panic!("expected priced valuation");
        };
        assert_eq!(values.narrow(), None);

        let value = calc.derive(&snapshot, &supplies).unwrap();
        // U256::MAX base units of a 6-decimal token, one token of supply each.
        let whole = U256::MAX / pow10(6);
        let frac = (U256::MAX % pow10(6)).to_string();
        assert_eq!(value.yes_unit_value, format!("{whole}.{}", frac.trim_end_matches('0')));
        assert_eq!(value.no_unit_value, value.yes_unit_value);
        assert_eq!(value.yes_probability, "0.5000");
    }

    #[test]
    fn test_collateral_beyond_contract_range_priced() {
        let snapshot = MarketSnapshot { total_collateral: pow10(48), collateral_decimals: 6 };
        let supplies = OutcomeSupplies { yes_supply: WAD, no_supply: U256::from(3u8) * WAD };
        let calc = DerivedValueCalculator::new();

        let Valuation::Priced(values) = calc.fixed_values(&snapshot, &supplies).unwrap() else {
            panic!("expected priced valuation");
        };
        assert_eq!(values.narrow().map(|v| v.yes_value), Some(pow10(60)));

        let value = calc.derive(&snapshot, &supplies).unwrap();
        assert_eq!(value.yes_unit_value, format!("{}.0", pow10(42)));
        assert_eq!(value.yes_probability, "0.7500");
    }

    #[test]
    fn test_eighteen_decimal_collateral_unscaled() {
        let snapshot = MarketSnapshot { total_collateral: WAD, collateral_decimals: 18 };
        let supplies = OutcomeSupplies { yes_supply: WAD, no_supply: WAD };
        let Valuation::Priced(values) =
            DerivedValueCalculator::new().fixed_values(&snapshot, &supplies).unwrap()
        else {
            panic!("expected priced valuation");
        };
        assert_eq!(values.yes_value, widen(WAD));
        assert_eq!(values.yes_probability, WAD / U256::from(2u8));
    }

    #[test]
    fn test_parse_inputs() {
        let inputs = ValuationInputs::parse("1000000", "6", "300000000000000000", "700000000000000000").unwrap();
        assert_eq!(inputs.snapshot, one_token_usdc());
        assert_eq!(inputs.supplies.yes_supply, e17(3));

        assert!(ValuationInputs::parse("-1", "6", "1", "1").is_err());
        assert!(ValuationInputs::parse("1", "6.5", "1", "1").is_err());
        assert!(ValuationInputs::parse("1", "300", "1", "1").is_err());
    }

    #[test]
    fn test_divergence_tolerance() {
        let a = FixedTokenValues { yes_value: WAD, no_value: WAD, yes_probability: WAD };
        let b = FixedTokenValues {
            yes_value: WAD + U256::from(3u8),
            no_value: WAD,
            yes_probability: WAD - U256::from(1u8),
        };
        let divergence = Divergence::between(&a, &WideTokenValues::from(b));
        assert_eq!(divergence.yes_value, U256::from(3u8));
        assert!(divergence.exceeds(U256::from(2u8)));
        assert!(!divergence.exceeds(U256::from(3u8)));
    }
}
