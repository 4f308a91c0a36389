//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::market::PoolId;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    chains = config.chains.len(),
    active_chain = config.app.active_chain_id,
    markets = config.markets.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - At least one chain, each id unique
/// - An active chain that is actually configured
/// - Non-empty endpoint URLs
/// - A positive polling interval
/// - Pool ids that normalize to 32 bytes
fn validate_config(config: &AppConfig) -> Result<()> {
  // Chain validation
  anyhow::ensure!(
    !config.chains.is_empty(),
    "At least one chain must be configured"
  );

  let mut seen = HashSet::with_capacity(config.chains.len());
  for chain in &config.chains {
    anyhow::ensure!(
      seen.insert(chain.chain_id),
      "Chain id {} is configured more than once",
      chain.chain_id
    );
    anyhow::ensure!(
      !chain.rpc_url.is_empty(),
      "Chain {} ({}) has empty rpc_url",
      chain.chain_id,
      chain.name
    );
  }

  anyhow::ensure!(
    seen.contains(&config.app.active_chain_id),
    "active_chain_id {} has no [[chains]] entry",
    config.app.active_chain_id
  );

  // Blob store validation
  anyhow::ensure!(
    !config.blob_store.aggregator_url.is_empty(),
    "Blob store aggregator_url must not be empty"
  );
  anyhow::ensure!(
    !config.blob_store.publisher_url.is_empty(),
    "Blob store publisher_url must not be empty"
  );
  anyhow::ensure!(
    config.blob_store.store_epochs > 0,
    "Blob store store_epochs must be positive"
  );

  // Polling validation
  anyhow::ensure!(
    config.polling.interval_ms > 0,
    "Polling interval_ms must be positive"
  );

  // Market validation
  for (i, market) in config.markets.iter().enumerate() {
    PoolId::parse(&market.pool_id).with_context(|| {
      format!(
        "Market {} ({}) has invalid pool_id",
        i,
        market.label.as_deref().unwrap_or("unlabeled")
      )
    })?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const VALID: &str = r#"
[app]
name = "market-valuation"
active_chain_id = 84532

[[chains]]
chain_id = 84532
name = "Base Sepolia"
rpc_url = "https://sepolia.base.org"

[chains.contracts]
market_maker_hook = "0x0000000000000000000000000000000000000001"
view_helper = "0x0000000000000000000000000000000000000002"
collateral_token = "0x0000000000000000000000000000000000000003"

[[markets]]
pool_id = "0xabc"
label = "demo"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_valid_config_applies_defaults() {
    let config = parse_config(VALID).unwrap();
    assert_eq!(config.app.log_level, "info");
    assert_eq!(config.polling.interval_ms, 4_000);
    assert!(!config.polling.cross_check);
    assert_eq!(config.blob_store.store_epochs, 5);
    assert!(config.blob_store.metadata_blob_id.is_none());
    assert!(config.metrics.enabled);

    let registry = config.registry();
    assert_eq!(registry.len(), 1);
    let contracts = registry.contracts(84532).unwrap();
    assert!(contracts.uni_helper.is_none());
  }

  #[test]
  fn test_unknown_active_chain_rejected() {
    let content = VALID.replace("active_chain_id = 84532", "active_chain_id = 1");
    let err = parse_config(&content).unwrap_err();
    assert!(err.to_string().contains("active_chain_id"));
  }

  #[test]
  fn test_invalid_pool_id_rejected() {
    let content = VALID.replace("pool_id = \"0xabc\"", "pool_id = \"xyz\"");
    assert!(parse_config(&content).is_err());
  }

  #[test]
  fn test_zero_interval_rejected() {
    let content = format!("{VALID}\n[polling]\ninterval_ms = 0\n");
    assert!(parse_config(&content).is_err());
  }
}
