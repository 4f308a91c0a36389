//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketReader`: Read-only contract views (markets, supplies, values)
//! - `MarketWriter`: Signed transactions (swap, approve, claim)
//! - `BlobStore`: Human-readable market metadata

pub mod blob_store;
pub mod chain_client;
