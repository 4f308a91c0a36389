//! Prediction-market valuation client - Entry Point
//!
//! Initializes configuration, logging and the chain connection, then polls
//! outcome-token values for every watched market until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from the first argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Resolve the active chain from the `ChainRegistry`
//! 4. Connect the RPC provider (wallet from WALLET_PRIVATE_KEY, optional)
//! 5. Validate contract code on-chain
//! 6. Spawn metrics (:9090) and health (:8080) servers
//! 7. Load the market catalog and overlay blob metadata
//! 8. Spawn one token value poller per watched market
//! 9. Wait for SIGINT, broadcast shutdown, drain tasks
//!
//! `market-valuation <config> publish-metadata <records.json>` publishes a
//! metadata blob instead and exits.

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use market_valuation::adapters::blob::{WalrusClient, WalrusClientConfig};
use market_valuation::adapters::chain::{ChainProvider, ContractValidator, MarketContracts};
use market_valuation::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use market_valuation::config::{self, AppConfig};
use market_valuation::domain::market::{Market, MarketMetadata, PoolId};
use market_valuation::ports::blob_store::BlobStore;
use market_valuation::usecases::market_catalog::MarketCatalog;
use market_valuation::usecases::token_values::{TokenValuesPipeline, TokenValuesView, ValueSource};
use market_valuation::usecases::trading::Trader;

/// Interval between RPC liveness probes.
const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args.first().map_or("config.toml", String::as_str);

    // ── 1. Load configuration ───────────────────────────────
    let config = config::loader::load_config(config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        chain_id = config.app.active_chain_id,
        markets = config.markets.len(),
        "Starting market valuation client"
    );

    let blob_store = Arc::new(
        WalrusClient::new(WalrusClientConfig::from(&config.blob_store))
            .context("Failed to create blob store client")?,
    );

    match args.get(1).map(String::as_str) {
        None => {}
        Some("publish-metadata") => {
            let path = args
                .get(2)
                .context("publish-metadata needs a records file")?;
            return publish_metadata(blob_store.as_ref(), path).await;
        }
        Some(other) => anyhow::bail!("Unknown command: {other}"),
    }

    // ── 3. Resolve the active chain ─────────────────────────
    let registry = config.registry();
    let chain = registry
        .get(config.app.active_chain_id)
        .context("Active chain missing from registry")?
        .clone();

    // ── 4. Connect the RPC provider ─────────────────────────
    let signer = load_signer()?;
    if signer.is_none() {
        info!("WALLET_PRIVATE_KEY not set, running read-only");
    }
    let provider = Arc::new(
        ChainProvider::connect(&chain, signer)
            .await
            .context("Failed to connect to chain")?,
    );

    // ── 5. Validate contracts on-chain ──────────────────────
    ContractValidator::new(provider.inner())
        .validate_all(&chain.contracts)
        .await
        .context("Contract validation failed")?;

    let contracts = Arc::new(MarketContracts::new(Arc::clone(&provider), chain.contracts));

    // ── 6. Shutdown channel + metrics/health servers ────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_shutdown = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = health_server.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    }));

    let metrics = if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics")?);

        let serve = Arc::clone(&metrics).serve(
            config.metrics.bind_address.clone(),
            shutdown_tx.subscribe(),
        );
        handles.push(tokio::spawn(async move {
            if let Err(e) = serve.await {
                error!(error = %e, "Metrics server failed");
            }
        }));

        Some(metrics)
    } else {
        None
    };

    handles.push(spawn_health_probe(
        Arc::clone(&provider),
        Arc::clone(&health),
        metrics.clone(),
        shutdown_tx.subscribe(),
    ));

    // ── 7. Load the market catalog ──────────────────────────
    let catalog = MarketCatalog::new(
        Arc::clone(&contracts),
        Arc::clone(&blob_store),
        config.blob_store.metadata_blob_id.clone(),
        chain.contracts.market_maker_hook,
    );

    let markets = match catalog.list_markets().await {
        Ok(markets) => {
            health.set_catalog_loaded();
            markets
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Market catalog unavailable");
            Vec::new()
        }
    };

    if let Some(metrics) = &metrics {
        metrics.markets_loaded.set(i64::try_from(markets.len()).unwrap_or(i64::MAX));
    }
    for market in &markets {
        info!(
            pool_id = %market.id,
            question = %market.question,
            state = %market.state,
            pool_size = %market.collateral_pool_size,
            "Market"
        );
    }

    if provider.account().is_some() {
        report_claims(&Trader::new(Arc::clone(&contracts), Arc::clone(&contracts)), &markets).await;
    }

    // ── 8. Spawn token value pollers ────────────────────────
    let pool_ids = watched_pools(&config, &markets)?;
    if pool_ids.is_empty() {
        warn!("No markets to watch, pollers idle");
    }

    let tolerance = config
        .polling
        .cross_check
        .then(|| U256::from(config.polling.cross_check_tolerance_wei));
    let pipeline = TokenValuesPipeline::new(Arc::clone(&contracts));
    let pipeline = Arc::new(match tolerance {
        Some(tolerance) => pipeline.with_cross_check(tolerance),
        None => pipeline,
    });
    let interval = Duration::from_millis(config.polling.interval_ms);

    for pool_id in pool_ids {
        let (views, poller) =
            Arc::clone(&pipeline).watch(pool_id, interval, shutdown_tx.subscribe());
        handles.push(poller);
        handles.push(spawn_reporter(
            pool_id,
            views,
            metrics.clone(),
            tolerance,
            shutdown_tx.subscribe(),
        ));
        health.set_pollers_running();
    }

    info!(tasks = handles.len(), "All tasks spawned, client is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());
    health.set_chain_healthy(false);

    for handle in handles {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("Task did not stop within 5s");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Signer from `WALLET_PRIVATE_KEY`, if set.
fn load_signer() -> Result<Option<PrivateKeySigner>> {
    match std::env::var("WALLET_PRIVATE_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            let signer = PrivateKeySigner::from_str(key.trim())
                .context("WALLET_PRIVATE_KEY is not a valid private key")?;
            Ok(Some(signer))
        }
        _ => Ok(None),
    }
}

/// Configured markets, or every catalog market when none are configured.
fn watched_pools(config: &AppConfig, markets: &[Market]) -> Result<Vec<PoolId>> {
    if config.markets.is_empty() {
        return Ok(markets.iter().map(|m| m.id).collect());
    }
    config
        .markets
        .iter()
        .map(|m| PoolId::parse(&m.pool_id).with_context(|| format!("Invalid pool_id {}", m.pool_id)))
        .collect()
}

/// Log the claim status of every resolved market for the connected wallet.
async fn report_claims(trader: &Trader<MarketContracts, MarketContracts>, markets: &[Market]) {
    for market in markets.iter().filter(|m| m.resolved) {
        match trader.has_claimed(&market.id).await {
            Ok(claimed) => info!(pool_id = %market.id, claimed, outcome = ?market.outcome, "Resolved market"),
            Err(e) => warn!(pool_id = %market.id, error = %e, "Failed to read claim status"),
        }
    }
}

async fn publish_metadata(blob_store: &WalrusClient, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata file: {path}"))?;
    let records: Vec<MarketMetadata> =
        serde_json::from_str(&content).context("Metadata file is not a { poolId, description } array")?;

    let stored = blob_store.store_blob(&records).await?;
    match stored.blob_id {
        Some(blob_id) => info!(%blob_id, records = records.len(), "Set blob_store.metadata_blob_id to this id"),
        None => warn!(response = %stored.response, "Publisher returned no blob id"),
    }
    Ok(())
}

/// Probe RPC health periodically for `/ready` and the health gauge.
fn spawn_health_probe(
    provider: Arc<ChainProvider>,
    health: Arc<HealthState>,
    metrics: Option<Arc<MetricsRegistry>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_PROBE_INTERVAL);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let healthy = provider.is_healthy().await;
                    if !healthy {
                        warn!("RPC health probe failed");
                    }
                    health.set_chain_healthy(healthy);
                    if let Some(metrics) = &metrics {
                        metrics.rpc_healthy.set(if healthy { 1.0 } else { 0.0 });
                    }
                }
            }
        }
    })
}

/// Forward every published view to the log and metrics.
fn spawn_reporter(
    pool_id: PoolId,
    mut views: watch::Receiver<TokenValuesView>,
    metrics: Option<Arc<MetricsRegistry>>,
    tolerance: Option<U256>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let label = pool_id.to_string();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    if let Some(error) = &view.error {
                        warn!(pool_id = %pool_id, error = %error, "Token values unavailable");
                    } else if !view.is_loading {
                        info!(
                            pool_id = %pool_id,
                            yes = %view.yes_value,
                            no = %view.no_value,
                            probability = %view.probability,
                            source = ?view.source,
                            "Token values"
                        );
                    }
                    if let Some(metrics) = &metrics {
                        record_view(metrics, &label, &view, tolerance);
                    }
                }
            }
        }
    })
}

fn record_view(metrics: &MetricsRegistry, pool: &str, view: &TokenValuesView, tolerance: Option<U256>) {
    if view.error.is_some() {
        metrics.refresh_errors.with_label_values(&[pool]).inc();
        return;
    }
    let Some(source) = view.source else {
        return;
    };

    let source = match source {
        ValueSource::Direct => "direct",
        ValueSource::Derived => "derived",
    };
    metrics.refreshes.with_label_values(&[pool, source]).inc();

    if let Ok(probability) = view.probability.parse::<f64>() {
        metrics.yes_probability.with_label_values(&[pool]).set(probability);
    }
    if let Ok(value) = view.yes_value.parse::<f64>() {
        metrics.yes_value.with_label_values(&[pool]).set(value);
    }
    if let Ok(value) = view.no_value.parse::<f64>() {
        metrics.no_value.with_label_values(&[pool]).set(value);
    }

    if let (Some(divergence), Some(tolerance)) = (view.divergence, tolerance) {
        if divergence.exceeds(tolerance) {
            metrics.divergences.with_label_values(&[pool]).inc();
        }
    }
}
