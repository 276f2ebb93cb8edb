//! Prometheus Exposition - Pull-Triggered Scrape Endpoint
//!
//! Every GET on the telemetry path runs exactly one scrape cycle and
//! renders its samples together with the process-wide cycle metrics in
//! the Prometheus text format. Internal errors never reach the caller;
//! the cycle metrics are always present in the body.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::proto::{self, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::health::{self, HealthState};
use crate::domain::{MetricDesc, MetricSample};
use crate::ports::Connector;
use crate::usecases::{CycleMetrics, ScrapeOrchestrator};

/// Group samples into metric families, in first-seen descriptor order.
pub fn sample_families(samples: &[MetricSample]) -> Vec<MetricFamily> {
    let mut families: Vec<MetricFamily> = Vec::new();
    let mut index: HashMap<&'static str, usize> = HashMap::new();

    for sample in samples {
        let desc = sample.desc();
        let slot = *index.entry(desc.name).or_insert_with(|| {
            families.push(family_for(desc));
            families.len() - 1
        });
        families[slot].mut_metric().push(metric_for(sample));
    }

    families
}

/// Render domain samples plus cycle metrics as Prometheus text.
///
/// `include_default` adds the process-global default registry.
pub fn render(
    samples: &[MetricSample],
    cycle: &CycleMetrics,
    include_default: bool,
) -> Result<String, prometheus::Error> {
    let mut families = sample_families(samples);
    families.extend(cycle.gather());
    if include_default {
        families.extend(prometheus::gather());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn family_for(desc: &MetricDesc) -> MetricFamily {
    let mut family = MetricFamily::default();
    family.set_name(desc.name.to_string());
    family.set_help(desc.help.to_string());
    family.set_field_type(MetricType::GAUGE);
    family
}

fn metric_for(sample: &MetricSample) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in sample.labels() {
        let mut pair = LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.to_string());
        metric.mut_label().push(pair);
    }

    let mut gauge = proto::Gauge::default();
    gauge.set_value(sample.value());
    metric.set_gauge(gauge);
    metric
}

/// Shared state of the scrape handler.
struct ExpositionState<K: Connector> {
    orchestrator: Arc<ScrapeOrchestrator<K>>,
    include_default: bool,
}

/// Axum-based exporter HTTP server.
///
/// Serves the telemetry path plus /live and /ready on one listener.
pub struct MetricsServer<K: Connector> {
    /// Cycle driver, shared by every request.
    orchestrator: Arc<ScrapeOrchestrator<K>>,
    /// Path the scrape endpoint is mounted on.
    telemetry_path: String,
    /// Whether to append the default prometheus registry.
    include_default: bool,
}

impl<K: Connector> MetricsServer<K> {
    /// Create a new exporter server.
    pub fn new(
        orchestrator: Arc<ScrapeOrchestrator<K>>,
        telemetry_path: impl Into<String>,
        include_default: bool,
    ) -> Self {
        Self {
            orchestrator,
            telemetry_path: telemetry_path.into(),
            include_default,
        }
    }

    /// Build the router; exposed for in-process tests.
    pub fn router(&self) -> Router {
        let health = health::routes(HealthState::new(Arc::clone(self.orchestrator.metrics())));
        let state = Arc::new(ExpositionState {
            orchestrator: Arc::clone(&self.orchestrator),
            include_default: self.include_default,
        });

        Router::new()
            .route(&self.telemetry_path, get(scrape::<K>))
            .with_state(state)
            .merge(health)
    }

    /// Serve until `shutdown_rx` fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(
            address = %bind_address,
            path = %self.telemetry_path,
            "Exporter metrics server started"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// Run one cycle and render it.
///
/// The cycle runs on its own task: a client that disconnects drops
/// this handler, never the cycle, so metrics and the session are
/// always settled.
async fn scrape<K: Connector>(State(state): State<Arc<ExpositionState<K>>>) -> Response {
    let orchestrator = Arc::clone(&state.orchestrator);
    let cycle = tokio::spawn(async move {
        let mut samples: Vec<MetricSample> = Vec::new();
        orchestrator.run_cycle(&mut samples).await;
        samples
    });

    let samples = match cycle.await {
        Ok(samples) => samples,
        Err(e) => {
            error!(error = %e, "Scrape cycle task failed");
            Vec::new()
        }
    };

    match render(&samples, state.orchestrator.metrics(), state.include_default) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
