//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7, independently of the
//! metrics server. Readiness requires a reachable RPC node and something
//! to serve: a loaded market catalog or at least one running poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the RPC node answered the last probe.
    pub chain_healthy: Arc<AtomicBool>,
    /// Whether the market catalog has been loaded.
    pub catalog_loaded: Arc<AtomicBool>,
    /// Whether token value pollers are running.
    pub pollers_running: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Chain assumed healthy, nothing loaded yet.
    pub fn new() -> Self {
        Self {
            chain_healthy: Arc::new(AtomicBool::new(true)),
            catalog_loaded: Arc::new(AtomicBool::new(false)),
            pollers_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_chain_healthy(&self, healthy: bool) {
        self.chain_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_catalog_loaded(&self) {
        self.catalog_loaded.store(true, Ordering::Relaxed);
    }

    pub fn set_pollers_running(&self) {
        self.pollers_running.store(true, Ordering::Relaxed);
    }

    /// Check if the client is ready to serve values.
    pub fn is_ready(&self) -> bool {
        self.chain_healthy.load(Ordering::Relaxed)
            && (self.catalog_loaded.load(Ordering::Relaxed)
                || self.pollers_running.load(Ordering::Relaxed))
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Health state shared with all components.
    state: Arc<HealthState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    fn router(state: Arc<HealthState>) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(state)
    }

    /// Run the health check server until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Self::router(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 once markets are being served and RPC is healthy.
    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_requires_catalog_and_chain() {
        let state = HealthState::new();
        assert!(!state.is_ready());

        state.set_catalog_loaded();
        assert!(state.is_ready());

        state.set_chain_healthy(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn test_pollers_ready_without_catalog() {
        let state = HealthState::new();
        state.set_pollers_running();
        assert!(state.is_ready());

        state.set_chain_healthy(false);
        assert!(!state.is_ready());
    }
}
