//! Contract Validator - On-chain Verification at Startup
//!
//! Checks that every configured contract address has deployed code, so a
//! typo or a wrong network fails at startup instead of as a confusing
//! revert later. The hook and view helper are required; the optional
//! helpers only warn.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::Provider;
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::config::ContractAddresses;

/// Result of validating a single contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Contract name for logging.
    pub name: &'static str,
    /// Address that was validated.
    pub address: Address,
    /// Whether the contract has deployed code.
    pub has_code: bool,
    /// Whether startup must stop when code is missing.
    pub required: bool,
}

/// Validates contract addresses against on-chain state.
pub struct ContractValidator {
    provider: Arc<dyn Provider + Send + Sync>,
}

impl ContractValidator {
    pub fn new(provider: Arc<dyn Provider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Validate all configured contracts.
    ///
    /// Returns an error if a required contract has no code.
    #[instrument(skip_all)]
    pub async fn validate_all(&self, addresses: &ContractAddresses) -> Result<Vec<ValidationResult>> {
        let mut contracts = vec![
            ("MarketMakerHook", addresses.market_maker_hook, true),
            ("ViewHelper", addresses.view_helper, true),
            ("Collateral token", addresses.collateral_token, false),
        ];
        if let Some(uni_helper) = addresses.uni_helper {
            contracts.push(("UniHelper", uni_helper, false));
        }

        let mut results = Vec::with_capacity(contracts.len());
        for (name, address, required) in contracts {
            let code = self
                .provider
                .get_code_at(address)
                .await
                .with_context(|| format!("Failed to query code for {name}"))?;

            let result = ValidationResult {
                name,
                address,
                has_code: !code.is_empty(),
                required,
            };

            if result.has_code {
                info!(contract = name, address = %address, "Contract validated: code exists on-chain");
            } else {
                warn!(contract = name, address = %address, "Contract has no code, possible misconfiguration");
            }
            results.push(result);
        }

        ensure_required(&results)?;

        info!(validated = results.len(), "All contract validations complete");
        Ok(results)
    }
}

fn ensure_required(results: &[ValidationResult]) -> Result<()> {
    if let Some(missing) = results.iter().find(|r| r.required && !r.has_code) {
        anyhow::bail!(
            "{} at {} has no deployed code, cannot proceed",
            missing.name,
            missing.address
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(required: bool, has_code: bool) -> ValidationResult {
        ValidationResult {
            name: "ViewHelper",
            address: Address::ZERO,
            has_code,
            required,
        }
    }

    #[test]
    fn test_missing_required_contract_fails() {
        assert!(ensure_required(&[result(true, true), result(true, false)]).is_err());
    }

    #[test]
    fn test_missing_optional_contract_passes() {
        assert!(ensure_required(&[result(true, true), result(false, false)]).is_ok());
    }
}
