//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (blockchain RPC, HTTP blob storage, metrics
//! export). Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `blob`: Walrus aggregator/publisher client for market metadata
//! - `chain`: EVM contract interaction via alloy-rs
//! - `metrics`: Prometheus metrics export and health checks

pub mod blob;
pub mod chain;
pub mod metrics;
