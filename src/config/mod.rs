//! Configuration Module - TOML-based Client Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Contract addresses are keyed by chain id in an explicit
//! `ChainRegistry` built once at startup - nothing is hardcoded
//! in the domain layer and there is no global address table.

pub mod loader;

use std::collections::HashMap;

use alloy::primitives::Address;
use serde::Deserialize;

/// Top-level client configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any RPC connection is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Client identity and active network.
  pub app: AppSection,
  /// Networks the contracts are deployed on.
  pub chains: Vec<ChainConfig>,
  /// Metadata blob store endpoints.
  #[serde(default)]
  pub blob_store: BlobStoreConfig,
  /// Token value polling behaviour.
  #[serde(default)]
  pub polling: PollingConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Markets to poll. Empty means every market registered with the hook.
  #[serde(default)]
  pub markets: Vec<MarketConfig>,
}

/// Client identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable client name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Chain id whose contracts are used.
  pub active_chain_id: u64,
}

/// One network deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// EVM chain id (e.g. 84532 for Base Sepolia).
  pub chain_id: u64,
  /// Human-readable network name.
  pub name: String,
  /// JSON-RPC endpoint.
  pub rpc_url: String,
  /// Deployed contract addresses on this network.
  pub contracts: ContractAddresses,
}

/// Prediction-market contract addresses for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContractAddresses {
  /// Uniswap v4 hook holding the markets.
  pub market_maker_hook: Address,
  /// Read-only view contract (markets, supplies, values).
  pub view_helper: Address,
  /// Swap quoting helper.
  #[serde(default)]
  pub uni_helper: Option<Address>,
  /// Default collateral token.
  pub collateral_token: Address,
}

/// Blob store (Walrus) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobStoreConfig {
  /// Aggregator base URL (reads).
  #[serde(default = "default_aggregator_url")]
  pub aggregator_url: String,
  /// Publisher base URL (writes).
  #[serde(default = "default_publisher_url")]
  pub publisher_url: String,
  /// Blob holding market descriptions, if published.
  #[serde(default)]
  pub metadata_blob_id: Option<String>,
  /// Storage duration for published blobs, in epochs.
  #[serde(default = "default_store_epochs")]
  pub store_epochs: u32,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
}

/// Token value polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
  /// Interval between refreshes (milliseconds).
  #[serde(default = "default_interval_ms")]
  pub interval_ms: u64,
  /// Derive values even when the direct query succeeds and compare.
  #[serde(default)]
  pub cross_check: bool,
  /// Tolerated direct/derived difference in 18-decimal base units.
  #[serde(default)]
  pub cross_check_tolerance_wei: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export. The health server runs either way.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

/// A market to poll.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
  /// Pool id (hex, `0x` optional, padded to 32 bytes).
  pub pool_id: String,
  /// Optional label used in logs.
  #[serde(default)]
  pub label: Option<String>,
}

/// Contract deployments keyed by chain id, resolved once per process.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
  chains: HashMap<u64, ChainConfig>,
}

impl ChainRegistry {
  /// Build the registry from the configured chains.
  pub fn new(chains: &[ChainConfig]) -> Self {
    Self {
      chains: chains.iter().map(|c| (c.chain_id, c.clone())).collect(),
    }
  }

  /// Deployment for `chain_id`, if configured.
  pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
    self.chains.get(&chain_id)
  }

  /// Contract addresses for `chain_id`, if configured.
  pub fn contracts(&self, chain_id: u64) -> Option<ContractAddresses> {
    self.get(chain_id).map(|c| c.contracts)
  }

  pub fn len(&self) -> usize {
    self.chains.len()
  }

  pub fn is_empty(&self) -> bool {
    self.chains.is_empty()
  }
}

impl AppConfig {
  /// Registry of every configured deployment.
  pub fn registry(&self) -> ChainRegistry {
    ChainRegistry::new(&self.chains)
  }
}

impl Default for BlobStoreConfig {
  fn default() -> Self {
    Self {
      aggregator_url: default_aggregator_url(),
      publisher_url: default_publisher_url(),
      metadata_blob_id: None,
      store_epochs: default_store_epochs(),
      timeout_seconds: default_timeout(),
    }
  }
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_ms: default_interval_ms(),
      cross_check: false,
      cross_check_tolerance_wei: 0,
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_aggregator_url() -> String {
  "https://aggregator.walrus-testnet.walrus.space".to_string()
}

fn default_publisher_url() -> String {
  "https://publisher.walrus-testnet.walrus.space".to_string()
}

fn default_store_epochs() -> u32 {
  5
}

fn default_timeout() -> u64 {
  15
}

fn default_interval_ms() -> u64 {
  4_000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
