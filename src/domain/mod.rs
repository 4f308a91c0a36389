//! Domain layer - Core valuation logic and market models.
//!
//! Pure code only: no I/O, no async. Everything here is a function of its
//! inputs and testable in isolation (hexagonal architecture inner ring).

pub mod error;
pub mod fixed_point;
pub mod market;
pub mod valuation;

// Re-export core types for convenience
pub use error::{PoolIdError, ValuationError};
pub use market::{
    DerivedValue, FixedTokenValues, Market, MarketMetadata, MarketSnapshot, MarketState,
    OnchainMarket, OutcomeSide, OutcomeSupplies, PoolId,
};
pub use valuation::{DerivedValueCalculator, Divergence, Valuation, ValuationInputs, WideTokenValues};
