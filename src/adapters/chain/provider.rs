//! EVM RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Connects to the configured chain's JSON-RPC endpoint, checks that the
//! node reports the expected chain id, and exposes one shared provider to
//! every chain adapter.
//!
//! With a signer the provider carries the recommended fillers and an
//! `EthereumWallet`, so `send_transaction` fills and signs writes. Either
//! way it is stored type-erased as `dyn Provider`; adapters encode
//! calldata themselves and go through `call` / `send_transaction`.

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::ChainConfig;

/// Shared RPC provider for one chain.
pub struct ChainProvider {
    /// The alloy provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
    /// Signing account, when a wallet is attached.
    account: Option<Address>,
    /// Chain id reported by the node.
    chain_id: u64,
}

impl ChainProvider {
    /// Connect to `chain.rpc_url` and validate the chain id.
    ///
    /// `signer` attaches a wallet for transactions; without it the
    /// provider is read-only.
    #[instrument(skip_all, fields(chain = %chain.name))]
    pub async fn connect(chain: &ChainConfig, signer: Option<PrivateKeySigner>) -> Result<Self> {
        let account = signer.as_ref().map(PrivateKeySigner::address);

        let provider: Arc<dyn Provider + Send + Sync> = match signer {
            Some(signer) => Arc::new(
                ProviderBuilder::new()
                    .with_recommended_fillers()
                    .wallet(EthereumWallet::from(signer))
                    .on_builtin(&chain.rpc_url)
                    .await
                    .context("Failed to connect to RPC")?,
            ),
            None => Arc::new(
                ProviderBuilder::new()
                    .on_builtin(&chain.rpc_url)
                    .await
                    .context("Failed to connect to RPC")?,
            ),
        };

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if chain_id != chain.chain_id {
            anyhow::bail!(
                "Expected {} (chain_id={}), RPC reports chain_id={chain_id}",
                chain.name,
                chain.chain_id
            );
        }

        info!(chain_id, signer = ?account, "Connected to RPC");

        Ok(Self {
            provider,
            account,
            chain_id,
        })
    }

    /// Get a shared reference to the alloy provider (type-erased).
    pub fn inner(&self) -> Arc<dyn Provider + Send + Sync> {
        Arc::clone(&self.provider)
    }

    /// Signing account, if a wallet is attached.
    pub const fn account(&self) -> Option<Address> {
        self.account
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
