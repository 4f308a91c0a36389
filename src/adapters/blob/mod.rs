//! Blob Store Adapters - Off-chain Market Metadata
//!
//! Market descriptions are published as JSON blobs on Walrus and read
//! back through an aggregator.

pub mod walrus;

pub use walrus::{WalrusClient, WalrusClientConfig};
