//! Market Catalog Use Case - Market Listing and Metadata Overlay
//!
//! Builds the market index the way the hook exposes it:
//! 1. Read the number of registered markets
//! 2. Read every pool id concurrently
//! 3. Read every market record concurrently
//! 4. Overlay descriptions from the metadata blob (best effort)

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use crate::domain::fixed_point::check_token_decimals;
use crate::domain::market::{Market, MarketMetadata, MarketState, PoolId};
use crate::ports::blob_store::BlobStore;
use crate::ports::chain_client::{MarketReader, DEFAULT_TOKEN_DECIMALS};

/// Lifecycle flags of a single market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketStatus {
  pub state: MarketState,
  pub is_resolved: bool,
  pub is_claimed: bool,
}

/// Read-side catalog of all markets registered with the hook.
pub struct MarketCatalog<R: MarketReader, B: BlobStore> {
  reader: Arc<R>,
  blob_store: Arc<B>,
  /// Blob holding `{ poolId, description }` records, if any.
  metadata_blob_id: Option<String>,
  /// Hook address shown on every market.
  hook: Address,
}

impl<R: MarketReader, B: BlobStore> MarketCatalog<R, B> {
  /// Create a catalog.
  pub fn new(
    reader: Arc<R>,
    blob_store: Arc<B>,
    metadata_blob_id: Option<String>,
    hook: Address,
  ) -> Self {
    Self {
      reader,
      blob_store,
      metadata_blob_id,
      hook,
    }
  }

  /// List every market, with metadata overlaid where available.
  ///
  /// Chain read failures are surfaced (the first one wins); metadata
  /// failures only leave the placeholder text in place.
  #[instrument(skip(self))]
  pub async fn list_markets(&self) -> Result<Vec<Market>> {
    let count = self
      .reader
      .market_count()
      .await
      .context("Failed to read market count")?;

    if count == 0 {
      info!("No markets found");
      return Ok(Vec::new());
    }

    let pool_ids = try_join_all((0..count).map(|i| self.reader.market_pool_id(i)))
      .await
      .context("Failed to read market pool ids")?;

    debug!(markets = pool_ids.len(), "Fetching market details");

    let mut markets = try_join_all(pool_ids.iter().map(|id| self.market_view(id)))
      .await
      .context("Failed to read market details")?;

    self.overlay_metadata(&mut markets).await;

    info!(markets = markets.len(), "Loaded markets");
    Ok(markets)
  }

  /// Read a single market.
  #[instrument(skip(self), fields(pool_id = %pool_id))]
  pub async fn market(&self, pool_id: &PoolId) -> Result<Market> {
    let market = self
      .market_view(pool_id)
      .await
      .with_context(|| format!("Failed to read market {pool_id}"))?;

    let mut markets = vec![market];
    self.overlay_metadata(&mut markets).await;
    Ok(markets.remove(0))
  }

  /// Current lifecycle flags of a market.
  pub async fn market_status(&self, pool_id: &PoolId) -> Result<MarketStatus> {
    let market = self
      .reader
      .read_market(pool_id)
      .await
      .with_context(|| format!("Failed to read market state for {pool_id}"))?;

    Ok(MarketStatus {
      state: market.state,
      is_resolved: market.state.is_resolved(),
      is_claimed: market.state.is_claimed(),
    })
  }

  async fn market_view(&self, pool_id: &PoolId) -> Result<Market> {
    let onchain = self.reader.read_market(pool_id).await?;

    let decimals = match self
      .reader
      .read_token_decimals(onchain.collateral_address)
      .await
      .and_then(|raw| check_token_decimals(raw).map_err(Into::into))
    {
      Ok(decimals) => decimals,
      Err(e) => {
        warn!(
          token = %onchain.collateral_address,
          error = %e,
          "Failed to read collateral decimals, assuming 18"
        );
        DEFAULT_TOKEN_DECIMALS
      }
    };

    Ok(Market::from_onchain(&onchain, self.hook, decimals))
  }

  async fn overlay_metadata(&self, markets: &mut [Market]) {
    let Some(blob_id) = self.metadata_blob_id.as_deref() else {
      return;
    };

    let records = match self.blob_store.fetch_blob(blob_id).await {
      Ok(records) => records,
      Err(e) => {
        warn!(blob_id, error = %e, "Market metadata unavailable, keeping placeholders");
        return;
      }
    };

    let by_pool = index_metadata(records);
    let mut applied = 0usize;
    for market in markets.iter_mut() {
      if let Some(metadata) = by_pool.get(&market.id) {
        market.apply_metadata(metadata);
        applied += 1;
      }
    }

    debug!(applied, "Market metadata overlaid");
  }
}

/// Key metadata by normalized pool id. Records with unparseable ids are
/// dropped; later records win over earlier duplicates.
fn index_metadata(records: Vec<MarketMetadata>) -> HashMap<PoolId, MarketMetadata> {
  let mut by_pool = HashMap::with_capacity(records.len());
  for record in records {
    match PoolId::parse(&record.pool_id) {
      Ok(id) => {
        by_pool.insert(id, record);
      }
      Err(e) => debug!(pool_id = %record.pool_id, error = %e, "Skipping metadata record"),
    }
  }
  by_pool
}
