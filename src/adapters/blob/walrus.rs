//! Walrus HTTP Client - Metadata Blob Reads and Writes
//!
//! Reads blobs from an aggregator (`GET /v1/blobs/{id}`) and publishes
//! them through a publisher (`PUT /v1/blobs?epochs=N`). Transient failures
//! (5xx, 429, transport errors) are retried with exponential backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::BlobStoreConfig;
use crate::domain::market::MarketMetadata;
use crate::ports::blob_store::{BlobStore, StoredBlob};

/// Configuration for the Walrus HTTP client.
#[derive(Debug, Clone)]
pub struct WalrusClientConfig {
  /// Aggregator base URL (reads).
  pub aggregator_url: String,
  /// Publisher base URL (writes).
  pub publisher_url: String,
  /// Storage duration for published blobs, in epochs.
  pub epochs: u32,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl Default for WalrusClientConfig {
  fn default() -> Self {
    Self::from(&BlobStoreConfig::default())
  }
}

impl From<&BlobStoreConfig> for WalrusClientConfig {
  fn from(config: &BlobStoreConfig) -> Self {
    Self {
      aggregator_url: config.aggregator_url.trim_end_matches('/').to_string(),
      publisher_url: config.publisher_url.trim_end_matches('/').to_string(),
      epochs: config.store_epochs,
      timeout: Duration::from_secs(config.timeout_seconds),
      max_retries: 2,
      retry_base_delay: Duration::from_millis(250),
    }
  }
}

/// HTTP client for a Walrus aggregator/publisher pair.
pub struct WalrusClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: WalrusClientConfig,
}

impl WalrusClient {
  /// Create a new Walrus client.
  pub fn new(config: WalrusClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(2)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self { http, config })
  }

  fn blob_url(&self, blob_id: &str) -> String {
    format!("{}/v1/blobs/{}", self.config.aggregator_url, blob_id)
  }

  fn store_url(&self) -> String {
    format!(
      "{}/v1/blobs?epochs={}",
      self.config.publisher_url, self.config.epochs
    )
  }

  /// Execute request with retries on transient failures.
  async fn execute_with_retry(&self, request: RequestBuilder, what: &str) -> Result<Response> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying blob request");
        sleep(delay).await;
      }

      let req = request
        .try_clone()
        .context("Failed to clone request")?;

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response),
          status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
            warn!(status = %status, what, "Transient blob store error, retrying");
            last_error = Some(anyhow::anyhow!("{what}: HTTP {status}"));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{what}: HTTP {status}: {body}");
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, what, "Blob request failed");
          last_error = Some(anyhow::Error::new(e).context(what.to_string()));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{what}: max retries exceeded")))
  }
}

#[async_trait]
impl BlobStore for WalrusClient {
  #[instrument(skip(self))]
  async fn fetch_blob(&self, blob_id: &str) -> Result<Vec<MarketMetadata>> {
    let request = self
      .http
      .get(self.blob_url(blob_id))
      .header("Accept", "application/json");

    let response = self.execute_with_retry(request, "Blob fetch").await?;
    let records: Vec<MarketMetadata> = response
      .json()
      .await
      .with_context(|| format!("Blob {blob_id} is not a market metadata array"))?;

    debug!(records = records.len(), "Fetched market metadata");
    Ok(records)
  }

  #[instrument(skip(self, records), fields(records = records.len()))]
  async fn store_blob(&self, records: &[MarketMetadata]) -> Result<StoredBlob> {
    let body = serde_json::to_string(records).context("Failed to encode market metadata")?;

    let request = self
      .http
      .put(self.store_url())
      .header("Content-Type", "application/json")
      .body(body);

    let response = self.execute_with_retry(request, "Blob store").await?;
    let response: Value = response
      .json()
      .await
      .context("Publisher returned a non-JSON body")?;

    let blob_id = extract_blob_id(&response);
    match &blob_id {
      Some(id) => info!(blob_id = %id, "Market metadata stored"),
      None => warn!("Publisher response carried no blob id"),
    }

    Ok(StoredBlob { blob_id, response })
  }
}

/// Blob id from a publisher response.
///
/// New uploads report `newlyCreated.blobObject.blobId`; content the network
/// already holds reports `alreadyCertified.blobId`.
pub fn extract_blob_id(response: &Value) -> Option<String> {
  response
    .pointer("/newlyCreated/blobObject/blobId")
    .or_else(|| response.pointer("/alreadyCertified/blobId"))
    .and_then(Value::as_str)
    .map(str::to_string)
}
