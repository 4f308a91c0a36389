//! Trading Use Case - Share Purchases, Approvals and Claims
//!
//! Validates user intent before anything is signed, then submits through
//! the `MarketWriter` port. Every write returns only after the receipt is
//! observed, so follow-up reads (values, claim status) see fresh state.

use std::sync::Arc;

use alloy::primitives::{Address, I256, TxHash, U256};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::fixed_point::{pow10, WAD_DECIMALS};
use crate::domain::market::{OutcomeSide, PoolId};
use crate::ports::chain_client::{MarketReader, MarketWriter, TxOutcome};

/// Errors surfaced to callers of trading operations.
#[derive(Debug, Error)]
pub enum TradingError {
  /// No signer is configured.
  #[error("wallet not connected")]
  WalletNotConnected,

  /// The requested amount cannot be expressed as a positive 18-decimal value.
  #[error("invalid amount {amount}: {reason}")]
  InvalidAmount {
    amount: Decimal,
    reason: &'static str,
  },

  /// The connected account already redeemed this market.
  #[error("winnings for market {0} were already claimed")]
  AlreadyClaimed(PoolId),

  /// The transaction was included but reverted.
  #[error("transaction {0} reverted")]
  Reverted(TxHash),

  /// RPC or contract failure.
  #[error(transparent)]
  Chain(#[from] anyhow::Error),
}

/// Convert a user-entered token amount into 18-decimal base units.
pub fn to_wad(amount: Decimal) -> Result<U256, TradingError> {
  let invalid = |reason| TradingError::InvalidAmount { amount, reason };

  if amount <= Decimal::ZERO {
    return Err(invalid("amount must be positive"));
  }
  let scale = amount.scale();
  if scale > u32::from(WAD_DECIMALS) {
    return Err(invalid("amount has more than 18 decimal places"));
  }

  let mantissa = u128::try_from(amount.mantissa()).map_err(|_| invalid("amount must be positive"))?;
  // scale <= 18 was checked above
  let exponent = WAD_DECIMALS - scale as u8;
  Ok(U256::from(mantissa) * pow10(exponent))
}

/// Submits trades and claims for the connected wallet.
pub struct Trader<R: MarketReader, W: MarketWriter> {
  reader: Arc<R>,
  writer: Arc<W>,
}

impl<R: MarketReader, W: MarketWriter> Trader<R, W> {
  pub fn new(reader: Arc<R>, writer: Arc<W>) -> Self {
    Self { reader, writer }
  }

  fn account(&self) -> Result<Address, TradingError> {
    self.writer.account().ok_or(TradingError::WalletNotConnected)
  }

  /// Buy `amount` worth of outcome tokens on `side`.
  #[instrument(skip(self), fields(pool_id = %pool_id, side = %side, amount = %amount))]
  pub async fn buy_shares(
    &self,
    pool_id: &PoolId,
    side: OutcomeSide,
    amount: Decimal,
  ) -> Result<TxOutcome, TradingError> {
    self.account()?;
    let wad = to_wad(amount)?;
    let signed = I256::try_from(wad).map_err(|_| TradingError::InvalidAmount {
      amount,
      reason: "amount exceeds int256",
    })?;

    info!("Submitting swap");
    let outcome = self.writer.swap(pool_id, side, signed).await?;
    Self::check_included(outcome)
  }

  /// Approve `spender` to move `amount` of `token`.
  #[instrument(skip(self))]
  pub async fn approve(
    &self,
    token: Address,
    spender: Address,
    amount: U256,
  ) -> Result<TxOutcome, TradingError> {
    self.account()?;
    info!("Submitting approval");
    let outcome = self.writer.approve(token, spender, amount).await?;
    Self::check_included(outcome)
  }

  /// Whether the connected account already claimed `pool_id`.
  pub async fn has_claimed(&self, pool_id: &PoolId) -> Result<bool, TradingError> {
    let account = self.account()?;
    Ok(self.reader.has_claimed(pool_id, account).await?)
  }

  /// Claim winnings, refusing markets this account already claimed.
  #[instrument(skip(self), fields(pool_id = %pool_id))]
  pub async fn claim(&self, pool_id: &PoolId) -> Result<TxOutcome, TradingError> {
    if self.has_claimed(pool_id).await? {
      return Err(TradingError::AlreadyClaimed(*pool_id));
    }

    info!("Submitting claim");
    let outcome = self.writer.claim(pool_id).await?;
    Self::check_included(outcome)
  }

  fn check_included(outcome: TxOutcome) -> Result<TxOutcome, TradingError> {
    if outcome.success {
      info!(tx_hash = %outcome.tx_hash, block = ?outcome.block_number, "Transaction included");
      Ok(outcome)
    } else {
      warn!(tx_hash = %outcome.tx_hash, "Transaction reverted");
      Err(TradingError::Reverted(outcome.tx_hash))
    }
  }
}
