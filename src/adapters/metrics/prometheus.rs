//! Prometheus Metrics Registry - Valuation Observability
//!
//! Registers and exposes Prometheus metrics on :9090. Covers token value
//! refreshes per source, fallback failures, the latest implied
//! probabilities and RPC health.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Centralized Prometheus metrics for the valuation client.
///
/// All metrics follow the naming convention `market_valuation_*` and
/// carry a `pool_id` label where they describe a single market.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Successful refreshes, labelled by value source (direct/derived).
    pub refreshes: IntCounterVec,
    /// Refreshes that ended with an error.
    pub refresh_errors: IntCounterVec,
    /// Latest implied YES probability.
    pub yes_probability: GaugeVec,
    /// Latest YES token unit value in collateral.
    pub yes_value: GaugeVec,
    /// Latest NO token unit value in collateral.
    pub no_value: GaugeVec,
    /// Direct/derived cross-check mismatches.
    pub divergences: IntCounterVec,
    /// Markets found in the hook registry at startup.
    pub markets_loaded: IntGauge,
    /// RPC connection status (1 = healthy, 0 = unreachable).
    pub rpc_healthy: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let refreshes = IntCounterVec::new(
            Opts::new(
                "market_valuation_refreshes_total",
                "Token value refreshes by source",
            ),
            &["pool_id", "source"],
        )?;

        let refresh_errors = IntCounterVec::new(
            Opts::new(
                "market_valuation_refresh_errors_total",
                "Refreshes where both direct and derived paths failed",
            ),
            &["pool_id"],
        )?;

        let yes_probability = GaugeVec::new(
            Opts::new(
                "market_valuation_yes_probability",
                "Latest implied YES probability",
            ),
            &["pool_id"],
        )?;

        let yes_value = GaugeVec::new(
            Opts::new(
                "market_valuation_yes_value",
                "Latest YES token value in collateral units",
            ),
            &["pool_id"],
        )?;

        let no_value = GaugeVec::new(
            Opts::new(
                "market_valuation_no_value",
                "Latest NO token value in collateral units",
            ),
            &["pool_id"],
        )?;

        let divergences = IntCounterVec::new(
            Opts::new(
                "market_valuation_divergences_total",
                "Direct values differing from derived values beyond tolerance",
            ),
            &["pool_id"],
        )?;

        let markets_loaded = IntGauge::new(
            "market_valuation_markets_loaded",
            "Markets registered with the hook at startup",
        )?;

        let rpc_healthy = Gauge::new(
            "market_valuation_rpc_healthy",
            "RPC connection status (1=healthy, 0=unreachable)",
        )?;

        // Register all metrics
        registry.register(Box::new(refreshes.clone()))?;
        registry.register(Box::new(refresh_errors.clone()))?;
        registry.register(Box::new(yes_probability.clone()))?;
        registry.register(Box::new(yes_value.clone()))?;
        registry.register(Box::new(no_value.clone()))?;
        registry.register(Box::new(divergences.clone()))?;
        registry.register(Box::new(markets_loaded.clone()))?;
        registry.register(Box::new(rpc_healthy.clone()))?;

        Ok(Self {
            registry,
            refreshes,
            refresh_errors,
            yes_probability,
            yes_value,
            no_value,
            divergences,
            markets_loaded,
            rpc_healthy,
        })
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_labelled_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics
            .refreshes
            .with_label_values(&["0xabc", "derived"])
            .inc();
        metrics.yes_probability.with_label_values(&["0xabc"]).set(0.7);

        let text = metrics.render().unwrap();
        assert!(text.contains("market_valuation_refreshes_total"));
        assert!(text.contains("source=\"derived\""));
        assert!(text.contains("market_valuation_yes_probability{pool_id=\"0xabc\"} 0.7"));
    }
}
