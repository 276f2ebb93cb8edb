//! Use Cases Layer - Scrape Orchestration
//!
//! Orchestrates the database connection and the collector ports into
//! the exporter's one workflow: a scrape cycle.
//!
//! Use cases:
//! - `VersionProbe`: Major-version detection and liveness check
//! - `ConnectionManager`: Single-session lifecycle with one reconnect
//! - `ScrapeOrchestrator`: Locked, failure-isolated scrape cycle
//! - `CycleMetrics`: Process-wide scrape counters and health flag

pub mod connection_manager;
pub mod cycle_metrics;
pub mod scrape_orchestrator;
pub mod version_probe;

pub use connection_manager::{ConnectionManager, ConnectionState};
pub use cycle_metrics::{CycleMetrics, CycleSnapshot};
pub use scrape_orchestrator::{ConnectionPolicy, ScrapeOrchestrator};
pub use version_probe::VersionProbe;
