//! Greenplum Collectors - One Type per Metric Domain
//!
//! Each collector implements the `Collector` port for `PgSession`.
//! Queries alias their columns to the descriptor's label names plus a
//! `value` column, so a row maps to a sample without per-collector
//! scanning code.
//!
//! Collectors:
//! - `activity`: Running sessions from `pg_stat_activity`
//! - `session_memory`: Per-session vmem across segments
//! - `disk_space`: Free space per segment host and device
//! - `master_log`: Notable statements from the master log
//! - `table_bloat`: Heap bloat diagnostics, per database
//! - `data_skew`: Tables with uneven segment distribution, per database

pub mod activity;
pub mod data_skew;
pub mod disk_space;
pub mod master_log;
pub mod session_memory;
pub mod table_bloat;

pub use activity::ActivityCollector;
pub use data_skew::DataSkewCollector;
pub use disk_space::DiskSpaceCollector;
pub use master_log::MasterLogCollector;
pub use session_memory::SessionMemoryCollector;
pub use table_bloat::TableBloatCollector;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::connector::PgSession;
use super::rows::{forward_rows, row_to_sample};
use crate::domain::{MetricDesc, SampleSink};
use crate::error::{CollectorError, DatabaseError, TargetFailure};
use crate::ports::{Collector, CollectorRegistry, DatabaseSession};

/// Names accepted in the `collectors.enabled` configuration list.
pub const KNOWN_COLLECTORS: &[&str] = &[
    activity::NAME,
    session_memory::NAME,
    disk_space::NAME,
    master_log::NAME,
    table_bloat::NAME,
    data_skew::NAME,
];

/// Instantiate a collector by its configuration name.
pub fn collector_by_name(name: &str) -> Option<Box<dyn Collector<PgSession>>> {
    let collector: Box<dyn Collector<PgSession>> = match name {
        activity::NAME => Box::new(ActivityCollector),
        session_memory::NAME => Box::new(SessionMemoryCollector),
        disk_space::NAME => Box::new(DiskSpaceCollector),
        master_log::NAME => Box::new(MasterLogCollector),
        table_bloat::NAME => Box::new(TableBloatCollector),
        data_skew::NAME => Box::new(DataSkewCollector),
        _ => return None,
    };
    Some(collector)
}

/// Build the scrape registry in the configured order.
pub fn build_registry(names: &[String]) -> anyhow::Result<CollectorRegistry<PgSession>> {
    let collectors = names
        .iter()
        .map(|name| {
            collector_by_name(name).ok_or_else(|| anyhow::anyhow!("unknown collector: {name}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CollectorRegistry::new(collectors))
}

/// Run one query and push a sample per row.
async fn query_into_sink(
    session: &PgSession,
    sql: &'static str,
    desc: &'static MetricDesc,
    sink: &mut dyn SampleSink,
) -> Result<usize, CollectorError> {
    debug!(metric = desc.name, sql, "Query database");
    let rows = sqlx::query(sql).fetch(session.pool());
    forward_rows(rows, sink, |row| row_to_sample(desc, row)).await
}

/// Where multi-target collectors find and open their databases.
#[async_trait]
trait TargetSource: Sync {
    /// Session on one target, owned by the caller until closed.
    type Target: Send + Sync;

    /// Names of every target to scrape.
    async fn list_targets(&self) -> Result<Vec<String>, DatabaseError>;

    /// Open a short-lived session on the named target.
    async fn open_target(&self, name: &str) -> Result<Self::Target, DatabaseError>;

    /// Release a target session.
    async fn close_target(&self, target: Self::Target);
}

#[async_trait]
impl TargetSource for PgSession {
    type Target = PgSession;

    async fn list_targets(&self) -> Result<Vec<String>, DatabaseError> {
        self.list_databases().await
    }

    async fn open_target(&self, name: &str) -> Result<PgSession, DatabaseError> {
        self.for_database(name).await
    }

    async fn close_target(&self, target: PgSession) {
        target.close().await;
    }
}

/// Work done once per database by multi-target collectors.
#[async_trait]
trait PerDatabase<T: Sync>: Send + Sync {
    /// Scrape one database through its own short-lived session.
    async fn scrape_database(
        &self,
        target: &T,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError>;
}

/// Run `work` against every target, continuing past failures.
///
/// Only the initial listing is fatal; per-target failures are
/// aggregated into one `Targets` error. Every opened target is closed.
async fn scrape_each_database<Src, W>(
    work: &W,
    identity: &str,
    source: &Src,
    sink: &mut dyn SampleSink,
) -> Result<(), CollectorError>
where
    Src: TargetSource,
    W: PerDatabase<Src::Target>,
{
    let databases = source.list_targets().await?;
    let mut failures = Vec::new();

    for database in databases {
        let target = match source.open_target(&database).await {
            Ok(target) => target,
            Err(e) => {
                warn!(collector = identity, database = %database, error = %e, "Failed to connect to database");
                failures.push(TargetFailure::new(database, e));
                continue;
            }
        };

        let result = work.scrape_database(&target, sink).await;
        source.close_target(target).await;

        if let Err(e) = result {
            warn!(collector = identity, database = %database, error = %e, "Failed to scrape database");
            failures.push(TargetFailure::new(database, e));
        }
    }

    CollectorError::from_targets(failures)
}
