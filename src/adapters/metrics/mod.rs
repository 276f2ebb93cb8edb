//! Metrics and Monitoring Adapters
//!
//! Serves the Prometheus text exposition (one scrape cycle per pull)
//! and the /live and /ready probes via axum 0.7.

pub mod exposition;
pub mod health;

pub use exposition::{MetricsServer, render};
pub use health::HealthState;
