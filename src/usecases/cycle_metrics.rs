//! Cycle Metrics - Process-Wide Scrape Health
//!
//! The four samples every exposition carries, regardless of whether
//! the database was reachable. Mutated only by the orchestrator while
//! it holds the cycle lock; never reset.

use std::time::Duration;

use prometheus::proto::MetricFamily;
use prometheus::{Gauge, IntCounter, Registry};

/// Point-in-time copy of the cycle metrics, for tests and logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSnapshot {
    /// Cycles attempted since startup.
    pub attempted: u64,
    /// Cycles whose connection could not be verified.
    pub failed: u64,
    /// Duration of the last cycle in seconds.
    pub last_duration_seconds: f64,
    /// Whether the last connection attempt succeeded.
    pub up: bool,
}

/// Prometheus-backed counters and gauges for scrape cycles.
pub struct CycleMetrics {
    /// Private registry so the exposition controls what gets gathered.
    registry: Registry,
    /// Total cycles attempted.
    total_scraped: IntCounter,
    /// Total cycles that failed to connect.
    total_error: IntCounter,
    /// Last cycle duration in seconds.
    scrape_duration: Gauge,
    /// 1 if the last connection attempt succeeded, else 0.
    up: Gauge,
}

impl CycleMetrics {
    /// Create and register the process-wide metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let total_scraped = IntCounter::new(
            "greenplum_exporter_total_scraped",
            "Total number of scrape cycles attempted",
        )?;

        let total_error = IntCounter::new(
            "greenplum_exporter_total_error",
            "Total number of scrape cycles that failed to connect",
        )?;

        let scrape_duration = Gauge::new(
            "greenplum_exporter_scrape_duration_second",
            "Elapsed time of the last scrape cycle in seconds",
        )?;

        let up = Gauge::new(
            "greenplum_up",
            "Whether the last connection attempt succeeded (1=yes, 0=no)",
        )?;

        registry.register(Box::new(total_scraped.clone()))?;
        registry.register(Box::new(total_error.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(up.clone()))?;

        Ok(Self {
            registry,
            total_scraped,
            total_error,
            scrape_duration,
            up,
        })
    }

    /// Count a new cycle.
    pub fn record_attempt(&self) {
        self.total_scraped.inc();
    }

    /// Count a cycle that could not connect.
    pub fn record_failure(&self) {
        self.total_error.inc();
    }

    /// Overwrite the health flag.
    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    /// Overwrite the last cycle duration.
    pub fn record_duration(&self, elapsed: Duration) {
        self.scrape_duration.set(elapsed.as_secs_f64());
    }

    /// Whether the last connection attempt succeeded.
    pub fn is_up(&self) -> bool {
        self.up.get() >= 1.0
    }

    /// Current values.
    pub fn snapshot(&self) -> CycleSnapshot {
        CycleSnapshot {
            attempted: self.total_scraped.get(),
            failed: self.total_error.get(),
            last_duration_seconds: self.scrape_duration.get(),
            up: self.is_up(),
        }
    }

    /// Gather the four metric families for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
