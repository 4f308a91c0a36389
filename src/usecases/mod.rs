//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain logic with port interfaces. Each use case is a
//! self-contained operation behind the market pages.
//!
//! Use cases:
//! - `TokenValuesPipeline`: Direct value query with client-side fallback
//! - `MarketCatalog`: Market listing with metadata overlay
//! - `Trader`: Share purchases, approvals and claims

pub mod market_catalog;
pub mod token_values;
pub mod trading;
