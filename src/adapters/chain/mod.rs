//! Chain Adapters - EVM Interaction Layer
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - RPC provider management with chain id validation
//! - ViewHelper and MarketMakerHook reads
//! - Swaps, ERC-20 approvals and winnings claims
//! - Startup validation of configured contract addresses

pub mod contracts;
pub mod provider;
pub mod validator;

pub use contracts::MarketContracts;
pub use provider::ChainProvider;
pub use validator::ContractValidator;
