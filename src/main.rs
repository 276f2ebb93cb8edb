//! Greenplum Exporter — Entry Point
//!
//! Initializes configuration, logging, the collector registry and the
//! scrape orchestrator, then serves Prometheus pulls until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from argv[1]) + env override + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create PgConnector from the data source URL
//! 4. Build the ordered collector registry from `collectors.enabled`
//! 5. Create CycleMetrics + ScrapeOrchestrator
//! 6. Spawn the metrics server (telemetry path + /live + /ready)
//! 7. Wait for SIGINT → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use greenplum_exporter::adapters::metrics::MetricsServer;
use greenplum_exporter::adapters::postgres::{PgConnector, build_registry};
use greenplum_exporter::config;
use greenplum_exporter::usecases::{CycleMetrics, ScrapeOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.exporter.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.exporter.name,
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.web.listen_address,
        collectors = ?config.collectors.enabled,
        "Greenplum exporter is starting"
    );

    // ── 3. Database connector (no connection until first pull) ─
    let connector = PgConnector::from_url(&config.database.data_source_url)
        .context("Failed to parse data source URL")?;

    // ── 4. Ordered, immutable collector registry ────────────
    let registry = build_registry(&config.collectors.enabled)
        .context("Failed to build collector registry")?;
    if registry.is_empty() {
        warn!("No collectors enabled; only cycle metrics will be exposed");
    } else {
        info!(collectors = ?registry.identities(), "Collector registry built");
    }

    // ── 5. Orchestrator + process-wide cycle metrics ────────
    let metrics = Arc::new(CycleMetrics::new().context("Failed to register cycle metrics")?);
    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        connector,
        registry,
        Arc::clone(&metrics),
        config.database.connection_policy,
    ));

    // ── 6. Spawn metrics server ─────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let server = MetricsServer::new(
        Arc::clone(&orchestrator),
        config.web.telemetry_path.clone(),
        !config.web.disable_default_metrics,
    );
    let server_shutdown = shutdown_tx.subscribe();
    let listen_address = config.web.listen_address.clone();
    let mut server_handle = tokio::spawn(server.serve(listen_address, server_shutdown));

    // ── 7. Wait for SIGINT (or the server dying on its own) ─
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
        exited = &mut server_handle => {
            let result = exited.context("Metrics server task panicked")?;
            if let Err(e) = &result {
                error!(error = %e, "Metrics server failed");
            }
            return result;
        }
    }

    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await;

    info!("Shutdown complete");
    Ok(())
}
