//! Token Values Use Case - Direct Query with Client-side Fallback
//!
//! Produces the unified `{ yes, no, probability, loading, error }` view of a
//! market's outcome-token values.
//!
//! Flow per refresh:
//! 1. Query the pricing contract's precomputed values
//! 2. On failure, read the market snapshot and the outcome supplies
//!    concurrently
//! 3. Derive the values locally once BOTH reads have completed
//! 4. Surface the direct query error only if the fallback inputs are
//!    unavailable too
//!
//! There is exactly one fallback path per refresh and no retry/backoff.
//! The polling loop simply re-runs the whole flow every interval.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::ValuationError;
use crate::domain::market::{
  DerivedValue, FixedTokenValues, MarketSnapshot, OutcomeSupplies, PoolId,
};
use crate::domain::valuation::{DerivedValueCalculator, Divergence, Valuation, ValuationInputs};
use crate::ports::chain_client::{MarketReader, DEFAULT_TOKEN_DECIMALS};

/// Where the displayed values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
  /// The pricing contract's own `getTokenValues`.
  Direct,
  /// Client-side derivation from collateral and supplies.
  Derived,
}

/// Error surfaced in the token values view.
///
/// Cloneable so views can be broadcast through `watch` channels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
  /// The direct query failed and the fallback inputs were unavailable.
  #[error("token value query failed: {0}")]
  Upstream(String),

  /// The direct query failed and the fallback rejected its inputs.
  #[error("token value query failed ({upstream}); fallback rejected inputs: {source}")]
  Derivation {
    upstream: String,
    source: ValuationError,
  },

  /// A one-shot load finished while inputs were still outstanding.
  #[error("token value inputs are still loading")]
  Incomplete,
}

/// State of one asynchronous read feeding the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
  /// Not yet completed.
  Pending,
  /// Completed with a value.
  Ready(T),
  /// Completed with an error (rendered message).
  Failed(String),
}

impl<T> Slot<T> {
  /// Slot for a completed read.
  pub fn from_result(result: anyhow::Result<T>) -> Self {
    match result {
      Ok(value) => Self::Ready(value),
      Err(e) => Self::Failed(format!("{e:#}")),
    }
  }

  pub const fn is_ready(&self) -> bool {
    matches!(self, Self::Ready(_))
  }
}

/// Unified result handed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValuesView {
  /// Unit value of one YES token, in collateral.
  pub yes_value: String,
  /// Unit value of one NO token, in collateral.
  pub no_value: String,
  /// Implied YES probability in [0, 1].
  pub probability: String,
  /// True while inputs are outstanding.
  pub is_loading: bool,
  /// Set when neither the direct query nor the fallback produced values.
  pub error: Option<PipelineError>,
  /// Origin of the current values, once any were produced.
  pub source: Option<ValueSource>,
  /// Direct vs derived difference, when a cross-check ran.
  pub divergence: Option<Divergence>,
  /// When the current values were produced.
  pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TokenValuesView {
  fn default() -> Self {
    Self {
      yes_value: "0".to_string(),
      no_value: "0".to_string(),
      probability: "0".to_string(),
      is_loading: true,
      error: None,
      source: None,
      divergence: None,
      updated_at: None,
    }
  }
}

impl TokenValuesView {
  /// Collapse the view into a `Result` for one-shot callers.
  pub fn into_result(self) -> Result<(DerivedValue, ValueSource), PipelineError> {
    if let Some(error) = self.error {
      return Err(error);
    }
    match self.source {
      Some(source) if !self.is_loading => Ok((
        DerivedValue {
          yes_unit_value: self.yes_value,
          no_unit_value: self.no_value,
          yes_probability: self.probability,
        },
        source,
      )),
      _ => Err(PipelineError::Incomplete),
    }
  }
}

enum Resolution {
  Loading,
  Ready(DerivedValue, ValueSource),
  Failed(PipelineError),
}

/// Synchronous reducer over the three reads behind one market's values.
///
/// Re-resolving is cheap and idempotent: the derivation is memoized on its
/// four scalar inputs, and it only runs once both fallback reads are ready.
#[derive(Debug, Default)]
pub struct TokenValuesTracker {
  calculator: DerivedValueCalculator,
  direct: Option<Slot<FixedTokenValues>>,
  market: Option<Slot<MarketSnapshot>>,
  supplies: Option<Slot<OutcomeSupplies>>,
  memo: Option<(ValuationInputs, Result<DerivedValue, ValuationError>)>,
  derivations: u64,
  view: TokenValuesView,
}

impl TokenValuesTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_direct(&mut self, slot: Slot<FixedTokenValues>) {
    self.direct = Some(slot);
  }

  pub fn set_market(&mut self, slot: Slot<MarketSnapshot>) {
    self.market = Some(slot);
  }

  pub fn set_supplies(&mut self, slot: Slot<OutcomeSupplies>) {
    self.supplies = Some(slot);
  }

  /// Collateral decimals, once the market snapshot has been read.
  pub fn collateral_decimals(&self) -> Option<u8> {
    match &self.market {
      Some(Slot::Ready(snapshot)) => Some(snapshot.collateral_decimals),
      _ => None,
    }
  }

  /// Latest resolved view.
  pub const fn view(&self) -> &TokenValuesView {
    &self.view
  }

  /// Number of times the calculator actually ran (memo misses).
  pub const fn derivations(&self) -> u64 {
    self.derivations
  }

  /// Recompute the view from the current slots.
  ///
  /// On failure the previous values stay visible alongside the error.
  pub fn resolve(&mut self) -> &TokenValuesView {
    match self.resolution() {
      Resolution::Loading => {
        self.view.is_loading = true;
        self.view.error = None;
      }
      Resolution::Ready(value, source) => {
        self.view.yes_value = value.yes_unit_value;
        self.view.no_value = value.no_unit_value;
        self.view.probability = value.yes_probability;
        self.view.is_loading = false;
        self.view.error = None;
        self.view.source = Some(source);
        self.view.updated_at = Some(Utc::now());
      }
      Resolution::Failed(error) => {
        self.view.is_loading = false;
        self.view.error = Some(error);
      }
    }
    &self.view
  }

  fn resolution(&mut self) -> Resolution {
    let upstream = match self.direct.clone() {
      None | Some(Slot::Pending) => return Resolution::Loading,
      Some(Slot::Ready(values)) => {
        let decimals = self.collateral_decimals().unwrap_or(DEFAULT_TOKEN_DECIMALS);
        return Resolution::Ready(
          DerivedValueCalculator::render(&values, decimals),
          ValueSource::Direct,
        );
      }
      Some(Slot::Failed(upstream)) => upstream,
    };

    let inputs = match (&self.market, &self.supplies) {
      (Some(Slot::Ready(snapshot)), Some(Slot::Ready(supplies))) => ValuationInputs {
        snapshot: *snapshot,
        supplies: *supplies,
      },
      (Some(Slot::Failed(_)), _) | (_, Some(Slot::Failed(_))) => {
        return Resolution::Failed(PipelineError::Upstream(upstream));
      }
      _ => return Resolution::Loading,
    };

    match self.derive_memoized(inputs) {
      Ok(value) => Resolution::Ready(value, ValueSource::Derived),
      Err(source) => Resolution::Failed(PipelineError::Derivation { upstream, source }),
    }
  }

  fn derive_memoized(&mut self, inputs: ValuationInputs) -> Result<DerivedValue, ValuationError> {
    if let Some((key, result)) = &self.memo {
      if *key == inputs {
        return result.clone();
      }
    }

    self.derivations += 1;
    let result = self.calculator.derive(&inputs.snapshot, &inputs.supplies);
    self.memo = Some((inputs, result.clone()));
    result
  }
}

/// Async driver that feeds a tracker from the chain.
pub struct TokenValuesPipeline<R: MarketReader> {
  reader: Arc<R>,
  calculator: DerivedValueCalculator,
  /// Maximum tolerated direct/derived difference (base units); `None`
  /// disables the cross-check.
  cross_check_tolerance: Option<U256>,
}

impl<R: MarketReader> TokenValuesPipeline<R> {
  /// Create a pipeline without cross-checking.
  pub fn new(reader: Arc<R>) -> Self {
    Self {
      reader,
      calculator: DerivedValueCalculator::new(),
      cross_check_tolerance: None,
    }
  }

  /// Also derive values when the direct query succeeds and compare them.
  pub fn with_cross_check(mut self, tolerance: U256) -> Self {
    self.cross_check_tolerance = Some(tolerance);
    self
  }

  /// Stage one: the pricing contract's precomputed values.
  pub async fn try_direct_query(&self, pool_id: &PoolId) -> anyhow::Result<FixedTokenValues> {
    self.reader.read_token_values(pool_id).await
  }

  /// Stage two: read the snapshot and supplies concurrently.
  ///
  /// Both reads always complete before this returns, so the derivation
  /// never sees partial data.
  pub async fn gather_inputs(
    &self,
    pool_id: &PoolId,
  ) -> (Slot<MarketSnapshot>, Slot<OutcomeSupplies>) {
    let (market, supplies) = tokio::join!(
      self.reader.read_market_snapshot(pool_id),
      self.reader.read_token_supplies(pool_id),
    );
    (Slot::from_result(market), Slot::from_result(supplies))
  }

  /// Run one refresh against `tracker` and return the resolved view.
  #[instrument(skip(self, tracker), fields(pool_id = %pool_id))]
  pub async fn refresh(
    &self,
    pool_id: &PoolId,
    tracker: &mut TokenValuesTracker,
  ) -> TokenValuesView {
    let mut divergence = None;

    match self.try_direct_query(pool_id).await {
      Ok(values) => {
        tracker.set_direct(Slot::Ready(values));

        if let Some(tolerance) = self.cross_check_tolerance {
          let (market, supplies) = self.gather_inputs(pool_id).await;
          divergence = self.cross_check(pool_id, &values, &market, &supplies, tolerance);
          tracker.set_market(market);
          tracker.set_supplies(supplies);
        } else if tracker.collateral_decimals().is_none() {
          let snapshot = self.reader.read_market_snapshot(pool_id).await;
          tracker.set_market(Slot::from_result(snapshot));
        }
      }
      Err(e) => {
        warn!(error = %e, "Direct token value query failed, deriving client-side");
        tracker.set_direct(Slot::Failed(format!("{e:#}")));

        let (market, supplies) = self.gather_inputs(pool_id).await;
        tracker.set_market(market);
        tracker.set_supplies(supplies);
      }
    }

    let mut view = tracker.resolve().clone();
    view.divergence = divergence;

    match (&view.error, view.source) {
      (Some(error), _) => warn!(error = %error, "Token values unavailable"),
      (None, Some(source)) => debug!(
        yes = %view.yes_value,
        no = %view.no_value,
        probability = %view.probability,
        source = ?source,
        "Token values resolved"
      ),
      (None, None) => debug!("Token values still loading"),
    }

    view
  }

  /// One-shot load: direct query, falling back to local derivation.
  pub async fn load(
    &self,
    pool_id: &PoolId,
  ) -> Result<(DerivedValue, ValueSource), PipelineError> {
    let mut tracker = TokenValuesTracker::new();
    self.refresh(pool_id, &mut tracker).await.into_result()
  }

  /// Poll `pool_id` every `interval`, publishing each view.
  ///
  /// Newer views overwrite older ones; nothing is cancelled mid-flight.
  /// Stops on the shutdown broadcast.
  pub fn watch(
    self: Arc<Self>,
    pool_id: PoolId,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> (watch::Receiver<TokenValuesView>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(TokenValuesView::default());

    let handle = tokio::spawn(async move {
      let mut tracker = TokenValuesTracker::new();
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

      loop {
        tokio::select! {
          biased;
          _ = shutdown_rx.recv() => {
            info!(pool_id = %pool_id, "Token value poller stopping");
            break;
          }
          _ = ticker.tick() => {
            let view = self.refresh(&pool_id, &mut tracker).await;
            tx.send_replace(view);
          }
        }
      }
    });

    (rx, handle)
  }

  fn cross_check(
    &self,
    pool_id: &PoolId,
    direct: &FixedTokenValues,
    market: &Slot<MarketSnapshot>,
    supplies: &Slot<OutcomeSupplies>,
    tolerance: U256,
  ) -> Option<Divergence> {
    let (Slot::Ready(snapshot), Slot::Ready(supplies)) = (market, supplies) else {
      debug!("Cross-check skipped, inputs unavailable");
      return None;
    };

    match self.calculator.fixed_values(snapshot, supplies) {
      Ok(Valuation::Priced(derived)) => {
        let divergence = Divergence::between(direct, &derived);
        if divergence.exceeds(tolerance) {
          warn!(
            pool_id = %pool_id,
            yes_diff = %divergence.yes_value,
            no_diff = %divergence.no_value,
            probability_diff = %divergence.yes_probability,
            "Direct and derived token values diverge"
          );
        }
        Some(divergence)
      }
      Ok(Valuation::Degenerate) => None,
      Err(e) => {
        warn!(error = %e, "Cross-check derivation rejected inputs");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::fixed_point::{pow10, WAD};

  fn usdc_snapshot() -> MarketSnapshot {
    MarketSnapshot {
      total_collateral: U256::from(1_000_000u64),
      collateral_decimals: 6,
    }
  }

  fn skewed_supplies() -> OutcomeSupplies {
    OutcomeSupplies {
      yes_supply: U256::from(3u8) * pow10(17),
      no_supply: U256::from(7u8) * pow10(17),
    }
  }

  #[test]
  fn test_initial_view_is_loading() {
    let mut tracker = TokenValuesTracker::new();
    let view = tracker.resolve();
    assert!(view.is_loading);
    assert_eq!(view.yes_value, "0");
    assert!(view.error.is_none());
  }

  #[test]
  fn test_direct_values_win() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Ready(FixedTokenValues {
      yes_value: WAD,
      no_value: WAD,
      yes_probability: WAD / U256::from(2u8),
    }));
    tracker.set_market(Slot::Ready(usdc_snapshot()));

    let view = tracker.resolve();
    assert_eq!(view.source, Some(ValueSource::Direct));
    assert_eq!(view.yes_value, "1.0");
    assert_eq!(view.probability, "0.5000");
    assert!(!view.is_loading);
  }

  #[test]
  fn test_fallback_waits_for_both_inputs() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Failed("execution reverted".to_string()));
    tracker.set_market(Slot::Ready(usdc_snapshot()));
    tracker.set_supplies(Slot::Pending);

    assert!(tracker.resolve().is_loading);
    assert_eq!(tracker.derivations(), 0);

    tracker.set_supplies(Slot::Ready(skewed_supplies()));
    let view = tracker.resolve();
    assert!(!view.is_loading);
    assert_eq!(view.source, Some(ValueSource::Derived));
    assert_eq!(view.yes_value, "3.333333");
    assert_eq!(view.no_value, "1.428571");
    assert_eq!(view.probability, "0.7000");
  }

  #[test]
  fn test_failed_input_surfaces_direct_error() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Failed("execution reverted".to_string()));
    tracker.set_market(Slot::Failed("rpc timeout".to_string()));
    tracker.set_supplies(Slot::Pending);

    let view = tracker.resolve();
    assert!(!view.is_loading);
    assert_eq!(
      view.error,
      Some(PipelineError::Upstream("execution reverted".to_string()))
    );
  }

  #[test]
  fn test_derivation_is_memoized() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Failed("execution reverted".to_string()));
    tracker.set_market(Slot::Ready(usdc_snapshot()));
    tracker.set_supplies(Slot::Ready(skewed_supplies()));

    let first = tracker.resolve().clone();
    let second = tracker.resolve().clone();
    assert_eq!(first.probability, second.probability);
    assert_eq!(tracker.derivations(), 1);

    tracker.set_supplies(Slot::Ready(OutcomeSupplies {
      yes_supply: WAD,
      no_supply: WAD,
    }));
    tracker.resolve();
    assert_eq!(tracker.derivations(), 2);
  }

  #[test]
  fn test_error_keeps_previous_values() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Failed("execution reverted".to_string()));
    tracker.set_market(Slot::Ready(usdc_snapshot()));
    tracker.set_supplies(Slot::Ready(skewed_supplies()));
    tracker.resolve();

    tracker.set_supplies(Slot::Failed("rpc timeout".to_string()));
    let view = tracker.resolve();
    assert_eq!(view.probability, "0.7000");
    assert!(view.error.is_some());
  }

  #[test]
  fn test_derivation_error_reported_with_upstream() {
    let mut tracker = TokenValuesTracker::new();
    tracker.set_direct(Slot::Failed("execution reverted".to_string()));
    tracker.set_market(Slot::Ready(MarketSnapshot {
      total_collateral: U256::from(1u8),
      collateral_decimals: 24,
    }));
    tracker.set_supplies(Slot::Ready(skewed_supplies()));

    let view = tracker.resolve();
    assert_eq!(
      view.error,
      Some(PipelineError::Derivation {
        upstream: "execution reverted".to_string(),
        source: ValuationError::DecimalsOutOfRange(24),
      })
    );
  }

  #[test]
  fn test_into_result_incomplete_while_loading() {
    assert_eq!(
      TokenValuesView::default().into_result(),
      Err(PipelineError::Incomplete)
    );
  }
}
