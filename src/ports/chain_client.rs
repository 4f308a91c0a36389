//! Chain Client Ports - On-chain Interaction Interface
//!
//! Read and write interfaces to the prediction-market contracts. Reads
//! go through the ViewHelper and MarketMakerHook views; writes are signed
//! transactions that only return once the receipt has been observed, so
//! any read issued afterwards sees the new state.

use alloy::primitives::{Address, I256, TxHash, U256};
use async_trait::async_trait;
use tracing::warn;

use crate::domain::market::{
  FixedTokenValues, MarketSnapshot, OnchainMarket, OutcomeSide, OutcomeSupplies, PoolId,
};

/// Decimals assumed when a token's `decimals()` read fails.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Receipt summary of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
  /// Transaction hash.
  pub tx_hash: TxHash,
  /// Block the transaction was included in.
  pub block_number: Option<u64>,
  /// Whether the transaction executed without reverting.
  pub success: bool,
}

/// Read-only access to market state.
#[async_trait]
pub trait MarketReader: Send + Sync + 'static {
  /// Full market record (`ViewHelper.getMarket`).
  async fn read_market(&self, pool_id: &PoolId) -> anyhow::Result<OnchainMarket>;

  /// Outstanding YES/NO supplies (`ViewHelper.getTokenSupplies`).
  async fn read_token_supplies(&self, pool_id: &PoolId) -> anyhow::Result<OutcomeSupplies>;

  /// Precomputed values from the pricing contract (`ViewHelper.getTokenValues`).
  ///
  /// This is the call the client-side derivation stands in for when it fails.
  async fn read_token_values(&self, pool_id: &PoolId) -> anyhow::Result<FixedTokenValues>;

  /// ERC-20 `decimals()` of a token.
  async fn read_token_decimals(&self, token: Address) -> anyhow::Result<u8>;

  /// Number of markets registered with the hook.
  async fn market_count(&self) -> anyhow::Result<u64>;

  /// Pool id of the market at `index` in the hook's registry.
  async fn market_pool_id(&self, index: u64) -> anyhow::Result<PoolId>;

  /// Whether `account` already claimed winnings for a market.
  async fn has_claimed(&self, pool_id: &PoolId, account: Address) -> anyhow::Result<bool>;

  /// Check if the RPC connection is healthy.
  async fn is_healthy(&self) -> bool;

  /// Collateral snapshot for valuation.
  ///
  /// A failed decimals read is not fatal: the collateral is assumed to use
  /// 18 decimals, like ETH.
  async fn read_market_snapshot(&self, pool_id: &PoolId) -> anyhow::Result<MarketSnapshot> {
    let market = self.read_market(pool_id).await?;
    let decimals = match self.read_token_decimals(market.collateral_address).await {
      Ok(decimals) => decimals,
      Err(e) => {
        warn!(
          token = %market.collateral_address,
          error = %e,
          "Failed to read collateral decimals, assuming 18"
        );
        DEFAULT_TOKEN_DECIMALS
      }
    };
    Ok(market.snapshot(decimals))
  }
}

/// Signed transactions against the market contracts.
#[async_trait]
pub trait MarketWriter: Send + Sync + 'static {
  /// Address that signs transactions, or `None` without a wallet.
  fn account(&self) -> Option<Address>;

  /// Swap collateral into outcome tokens (`executeSwap`).
  async fn swap(
    &self,
    pool_id: &PoolId,
    side: OutcomeSide,
    amount: I256,
  ) -> anyhow::Result<TxOutcome>;

  /// ERC-20 `approve(spender, amount)` on `token`.
  async fn approve(&self, token: Address, spender: Address, amount: U256)
    -> anyhow::Result<TxOutcome>;

  /// Redeem winning outcome tokens of a resolved market (`claimWinnings`).
  async fn claim(&self, pool_id: &PoolId) -> anyhow::Result<TxOutcome>;
}
