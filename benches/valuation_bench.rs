//! Valuation Benchmarks - Per-refresh Hot Path
//!
//! Benchmarks the pure code that runs on every poll of every market:
//! the fixed-point derivation, its formatting, and pool id parsing.
//!
//! Run with: cargo bench --bench valuation_bench

use alloy::primitives::U256;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use market_valuation::domain::fixed_point::{format_probability, format_units};
use market_valuation::domain::market::{MarketSnapshot, OutcomeSupplies, PoolId};
use market_valuation::domain::valuation::{DerivedValueCalculator, ValuationInputs};

fn usdc_market() -> (MarketSnapshot, OutcomeSupplies) {
    (
        MarketSnapshot {
            total_collateral: U256::from(1_250_000_000u64),
            collateral_decimals: 6,
        },
        OutcomeSupplies {
            yes_supply: U256::from(300_000_000_000_000_000_000u128),
            no_supply: U256::from(700_000_000_000_000_000_000u128),
        },
    )
}

/// Benchmark the raw U256 derivation.
fn bench_fixed_values(c: &mut Criterion) {
    let calc = DerivedValueCalculator::new();
    let (snapshot, supplies) = usdc_market();

    c.bench_function("fixed_values_usdc", |b| {
        b.iter(|| calc.fixed_values(black_box(&snapshot), black_box(&supplies)));
    });
}

/// Benchmark derivation plus display formatting.
fn bench_derive(c: &mut Criterion) {
    let calc = DerivedValueCalculator::new();
    let (snapshot, supplies) = usdc_market();

    c.bench_function("derive_usdc", |b| {
        b.iter(|| calc.derive(black_box(&snapshot), black_box(&supplies)));
    });
}

/// Benchmark formatting alone.
fn bench_formatting(c: &mut Criterion) {
    let value = U256::from(3_333_333_333_333_333_333u128);
    let probability = U256::from(699_950_000_000_000_000u64);

    c.bench_function("format_units_6dp", |b| {
        b.iter(|| format_units(black_box(value), 18, 6));
    });
    c.bench_function("format_probability", |b| {
        b.iter(|| format_probability(black_box(probability)));
    });
}

/// Benchmark parsing textual inputs and pool ids.
fn bench_parsing(c: &mut Criterion) {
    c.bench_function("parse_valuation_inputs", |b| {
        b.iter(|| {
            ValuationInputs::parse(
                black_box("1250000000"),
                black_box("6"),
                black_box("300000000000000000000"),
                black_box("700000000000000000000"),
            )
        });
    });

    c.bench_function("parse_pool_id", |b| {
        b.iter(|| PoolId::parse(black_box("0x3f1a9c")));
    });
}

criterion_group!(
    benches,
    bench_fixed_values,
    bench_derive,
    bench_formatting,
    bench_parsing
);
criterion_main!(benches);
