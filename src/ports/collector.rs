//! Collector Port - Per-Domain Metric Producers
//!
//! A collector queries one operational aspect of the cluster and
//! pushes samples into a sink. Collectors are independent types; the
//! registry is an ordered list fixed at startup.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{SampleSink, ServerVersion};
use crate::error::CollectorError;

/// Trait for metric-domain implementations.
///
/// `S` is the session type the collector queries through. Collectors
/// must not keep the session past `collect` and must drop any row
/// stream before returning, since the next collector reuses the same
/// single connection.
#[async_trait]
pub trait Collector<S: Sync>: Send + Sync {
    /// Stable name used in logs.
    fn identity(&self) -> &str;

    /// Run this collector's queries and push samples.
    ///
    /// Samples pushed before an error remain valid.
    async fn collect(
        &self,
        session: &S,
        version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError>;
}

/// Ordered, immutable set of collectors run on every cycle.
pub struct CollectorRegistry<S: Sync> {
    collectors: Vec<Box<dyn Collector<S>>>,
}

impl<S: Sync> CollectorRegistry<S> {
    /// Build the registry; order is scrape order.
    ///
    /// Duplicate identities are allowed but logged.
    pub fn new(collectors: Vec<Box<dyn Collector<S>>>) -> Self {
        let mut seen = HashSet::new();
        for collector in &collectors {
            if !seen.insert(collector.identity()) {
                warn!(collector = collector.identity(), "Duplicate collector identity in registry");
            }
        }
        Self { collectors }
    }

    /// Iterate in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Collector<S>> {
        self.collectors.iter().map(|c| c.as_ref())
    }

    /// Identities in registration order.
    pub fn identities(&self) -> Vec<&str> {
        self.iter().map(|c| c.identity()).collect()
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether no collector is registered.
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl<S: Sync> std::fmt::Debug for CollectorRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("len", &self.collectors.len())
            .finish()
    }
}
