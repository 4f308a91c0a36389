//! Property-Based Tests - Valuation Invariants
//!
//! Uses `proptest` to verify that the derived value calculator keeps its
//! fixed-point invariants across random market states.

use alloy::primitives::{U256, U512};
use proptest::prelude::*;

use market_valuation::domain::fixed_point::{widen, WAD};
use market_valuation::domain::market::{DerivedValue, MarketSnapshot, OutcomeSupplies};
use market_valuation::domain::valuation::{DerivedValueCalculator, Valuation};

fn snapshot(collateral: u64, decimals: u8) -> MarketSnapshot {
    MarketSnapshot {
        total_collateral: U256::from(collateral),
        collateral_decimals: decimals,
    }
}

fn supplies(yes: u128, no: u128) -> OutcomeSupplies {
    OutcomeSupplies {
        yes_supply: U256::from(yes),
        no_supply: U256::from(no),
    }
}

fn abs_diff(a: U512, b: U512) -> U512 {
    if a > b { a - b } else { b - a }
}

// ── Bounds ──────────────────────────────────────────────────

proptest! {
    /// The implied probability is always within [0, 1].
    #[test]
    fn probability_within_unit_interval(
        collateral in 1u64..1_000_000_000_000_000,
        decimals in 0u8..=18,
        yes in 1u128..=u128::from(u64::MAX) * 1_000,
        no in 1u128..=u128::from(u64::MAX) * 1_000,
    ) {
        let calc = DerivedValueCalculator::new();
        if let Valuation::Priced(values) = calc.fixed_values(&snapshot(collateral, decimals), &supplies(yes, no)).unwrap() {
            prop_assert!(values.yes_probability <= WAD, "p = {} > 1", values.yes_probability);
        }
    }

    /// YES and NO probabilities sum to one, short by at most one base unit.
    #[test]
    fn probabilities_complement(
        collateral in 1u64..1_000_000_000_000_000,
        decimals in 0u8..=18,
        yes in 1u128..1_000_000_000_000_000_000_000,
        no in 1u128..1_000_000_000_000_000_000_000,
    ) {
        let calc = DerivedValueCalculator::new();
        let s = snapshot(collateral, decimals);
        let forward = calc.fixed_values(&s, &supplies(yes, no)).unwrap();
        let mirrored = calc.fixed_values(&s, &supplies(no, yes)).unwrap();

        if let (Valuation::Priced(a), Valuation::Priced(b)) = (forward, mirrored) {
            prop_assert_eq!(a.yes_value, b.no_value);
            prop_assert_eq!(a.no_value, b.yes_value);
            let sum = a.yes_probability + b.yes_probability;
            prop_assert!(sum <= WAD && WAD - sum <= U256::from(1u8), "p + (1-p) = {}", sum);
        }
    }

    /// The scarcer outcome is worth more and is the more likely one.
    #[test]
    fn scarcer_side_has_higher_value(
        collateral in 1u64..1_000_000_000_000,
        yes in 1u128..1_000_000_000_000_000_000,
        extra in 0u128..1_000_000_000_000_000_000,
    ) {
        let calc = DerivedValueCalculator::new();
        let no = yes + extra;
        if let Valuation::Priced(values) = calc.fixed_values(&snapshot(collateral, 6), &supplies(yes, no)).unwrap() {
            prop_assert!(values.yes_value >= values.no_value);
            prop_assert!(values.yes_probability >= WAD / U256::from(2u8));
        }
    }
}

// ── Degenerate policy ───────────────────────────────────────

proptest! {
    /// Collateral anywhere in the 256-bit range is priced, never rejected.
    #[test]
    fn full_range_collateral_never_fails(
        limbs in any::<[u64; 4]>(),
        decimals in 0u8..=18,
        yes in 1u128..u128::MAX,
        no in 1u128..u128::MAX,
    ) {
        let s = MarketSnapshot { total_collateral: U256::from_limbs(limbs), collateral_decimals: decimals };
        prop_assert!(DerivedValueCalculator::new().derive(&s, &supplies(yes, no)).is_ok());
    }

    /// Any zero supply yields the 50/50 prior, never a division error.
    #[test]
    fn zero_supply_is_degenerate(
        collateral in 0u64..u64::MAX,
        decimals in 0u8..=18,
        other in 0u128..u128::MAX,
        zero_yes in any::<bool>(),
    ) {
        let s = if zero_yes { supplies(0, other) } else { supplies(other, 0) };
        let value = DerivedValueCalculator::new().derive(&snapshot(collateral, decimals), &s).unwrap();
        prop_assert_eq!(value, DerivedValue::degenerate());
    }

    /// Empty collateral yields the 50/50 prior whatever the supplies.
    #[test]
    fn zero_collateral_is_degenerate(
        decimals in 0u8..=18,
        yes in 1u128..u128::MAX,
        no in 1u128..u128::MAX,
    ) {
        let value = DerivedValueCalculator::new().derive(&snapshot(0, decimals), &supplies(yes, no)).unwrap();
        prop_assert_eq!(value, DerivedValue::degenerate());
    }
}

// ── Determinism and scaling ─────────────────────────────────

proptest! {
    /// Identical inputs always produce identical outputs.
    #[test]
    fn derivation_is_idempotent(
        collateral in 0u64..u64::MAX,
        decimals in 0u8..=18,
        yes in 0u128..u128::MAX,
        no in 0u128..u128::MAX,
    ) {
        let calc = DerivedValueCalculator::new();
        let s = snapshot(collateral, decimals);
        let q = supplies(yes, no);
        prop_assert_eq!(calc.derive(&s, &q), calc.derive(&s, &q));
    }

    /// Multiplying the collateral by k multiplies each value by k, up to
    /// the k base units lost to truncation, and leaves the probability
    /// unchanged up to that truncation: |p' - p| <= WAD / (yes + no) + 2.
    #[test]
    fn values_scale_with_collateral(
        collateral in 1u64..1_000_000_000_000,
        k in 1u64..1_000,
        decimals in 0u8..=18,
        yes in 1u128..1_000_000_000_000_000_000_000,
        no in 1u128..1_000_000_000_000_000_000_000,
    ) {
        let calc = DerivedValueCalculator::new();
        let q = supplies(yes, no);
        let base = calc.fixed_values(&snapshot(collateral, decimals), &q).unwrap();
        let scaled = calc.fixed_values(&snapshot(collateral * k, decimals), &q).unwrap();

        if let (Valuation::Priced(a), Valuation::Priced(b)) = (base, scaled) {
            let k = U512::from(k);
            prop_assert!(abs_diff(a.yes_value * k, b.yes_value) < k);
            prop_assert!(abs_diff(a.no_value * k, b.no_value) < k);

            let drift = abs_diff(widen(a.yes_probability), widen(b.yes_probability));
            let bound = widen(WAD) / (a.yes_value + a.no_value) + U512::from(2u8);
            prop_assert!(drift <= bound, "probability drifted by {} (bound {})", drift, bound);
        }
    }

    /// Collateral precision only changes the scale factor: the same
    /// amount in 6 and 18 decimals values identically.
    #[test]
    fn collateral_decimals_normalized(
        whole in 1u64..1_000_000_000,
        yes in 1u128..1_000_000_000_000_000_000_000,
        no in 1u128..1_000_000_000_000_000_000_000,
    ) {
        let calc = DerivedValueCalculator::new();
        let q = supplies(yes, no);
        let six = MarketSnapshot {
            total_collateral: U256::from(whole) * U256::from(1_000_000u64),
            collateral_decimals: 6,
        };
        let eighteen = MarketSnapshot {
            total_collateral: U256::from(whole) * WAD,
            collateral_decimals: 18,
        };
        prop_assert_eq!(calc.fixed_values(&six, &q).unwrap(), calc.fixed_values(&eighteen, &q).unwrap());
    }
}
