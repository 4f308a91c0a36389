//! Blob Store Port - Market Metadata Storage
//!
//! Markets on chain carry no human-readable text. Descriptions live in an
//! external blob store as a JSON array of `{ poolId, description }`.

use async_trait::async_trait;

use crate::domain::market::MarketMetadata;

/// Result of publishing a metadata blob.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
  /// Identifier to fetch the blob with, when the store reported one.
  pub blob_id: Option<String>,
  /// Raw response body from the store.
  pub response: serde_json::Value,
}

/// Trait for metadata blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
  /// Fetch and decode a metadata blob.
  async fn fetch_blob(&self, blob_id: &str) -> anyhow::Result<Vec<MarketMetadata>>;

  /// Publish a metadata blob.
  async fn store_blob(&self, records: &[MarketMetadata]) -> anyhow::Result<StoredBlob>;
}
