//! Scrape Orchestrator - One Full Scrape Cycle
//!
//! Serializes cycles behind a process-wide async mutex, verifies the
//! connection, runs every registered collector in order on the shared
//! session, and folds the outcome into `CycleMetrics`.
//!
//! Failure isolation:
//! - Connection failure ends the cycle early (health 0, failure +1)
//! - Collector failure is logged; the next collector still runs
//! - Nothing is returned to the caller; the exposition always renders

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::domain::SampleSink;
use crate::ports::{CollectorRegistry, Connector};
use crate::usecases::connection_manager::ConnectionManager;
use crate::usecases::cycle_metrics::CycleMetrics;

/// What to do with the session once every collector has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPolicy {
    /// Close after each cycle; the next cycle reconnects and re-probes.
    #[default]
    CloseAfterCycle,
    /// Keep the session; the next cycle's probe is the liveness check.
    KeepWarm,
}

/// Drives scrape cycles over a fixed collector registry.
pub struct ScrapeOrchestrator<K: Connector> {
    /// Cycle lock; also guards the connection.
    manager: Mutex<ConnectionManager<K>>,
    /// Collectors in scrape order.
    registry: CollectorRegistry<K::Session>,
    /// Process-wide cycle counters.
    metrics: Arc<CycleMetrics>,
    /// Post-cycle connection handling.
    policy: ConnectionPolicy,
}

impl<K: Connector> ScrapeOrchestrator<K> {
    /// Wire the orchestrator; the registry is fixed from here on.
    pub fn new(
        connector: K,
        registry: CollectorRegistry<K::Session>,
        metrics: Arc<CycleMetrics>,
        policy: ConnectionPolicy,
    ) -> Self {
        Self {
            manager: Mutex::new(ConnectionManager::new(connector)),
            registry,
            metrics,
            policy,
        }
    }

    /// Shared cycle metrics.
    pub fn metrics(&self) -> &Arc<CycleMetrics> {
        &self.metrics
    }

    /// Run one scrape cycle, pushing domain samples into `sink`.
    ///
    /// Waits if another cycle is in flight.
    #[instrument(skip_all, fields(collectors = self.registry.len()))]
    pub async fn run_cycle(&self, sink: &mut dyn SampleSink) {
        let mut manager = self.manager.lock().await;
        let started = Instant::now();
        self.metrics.record_attempt();

        let (session, version) = match manager.ensure_connection().await {
            Ok(verified) => verified,
            Err(e) => {
                self.metrics.record_failure();
                self.metrics.set_up(false);
                self.metrics.record_duration(started.elapsed());
                error!(error = %e, "Check database connection failed");
                return;
            }
        };

        info!(version = %version, "Check connection ok");
        self.metrics.set_up(true);

        let mut timings: Vec<(&str, Duration)> = Vec::with_capacity(self.registry.len());
        for collector in self.registry.iter() {
            let name = collector.identity();
            info!(collector = name, "Scraping start");
            let collector_started = Instant::now();

            let result = collector.collect(session, version, sink).await;
            let elapsed = collector_started.elapsed();
            timings.push((name, elapsed));

            match result {
                Ok(()) => info!(collector = name, elapsed_ms = elapsed.as_millis() as u64, "Scraping end"),
                Err(e) => warn!(
                    collector = name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Get metrics for collector failed"
                ),
            }
        }

        if self.policy == ConnectionPolicy::CloseAfterCycle {
            manager.close().await;
        }

        let elapsed = started.elapsed();
        self.metrics.record_duration(elapsed);

        info!(
            completed_at = %Utc::now(),
            elapsed_ms = elapsed.as_millis() as u64,
            timings = ?timings,
            "Scrape cycle completed"
        );
    }
}
