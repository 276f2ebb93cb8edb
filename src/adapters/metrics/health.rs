//! Health Checks - Liveness and Readiness Probes
//!
//! /live answers as long as the process runs. /ready reflects the
//! health flag: ready only while the last connection attempt succeeded.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::usecases::CycleMetrics;

/// Shared health state polled by readiness probes.
#[derive(Clone)]
pub struct HealthState {
    metrics: Arc<CycleMetrics>,
}

impl HealthState {
    /// Wrap the cycle metrics that carry the health flag.
    pub fn new(metrics: Arc<CycleMetrics>) -> Self {
        Self { metrics }
    }

    /// Check if the exporter last reached the database.
    pub fn is_ready(&self) -> bool {
        self.metrics.is_up()
    }
}

/// Probe routes, ready to merge into the exporter router.
pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: returns 200 only if the last cycle connected.
async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
