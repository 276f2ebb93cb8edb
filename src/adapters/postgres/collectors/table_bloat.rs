//! Heap table bloat from `gp_toolkit.gp_bloat_diag`, for every database.

use async_trait::async_trait;

use super::{PerDatabase, query_into_sink, scrape_each_database};
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "table_bloat";

static HEAP_TABLE_BLOAT_DETAIL: MetricDesc = MetricDesc::gauge(
    "greenplum_server_heap_table_bloat_detail",
    "Tables bloat detail for Greenplum database",
    &[
        "datname",
        "bdinspname",
        "bdirelname",
        "bdirelpages",
        "bdiexppages",
        "bloat_state",
    ],
);

/// `bloat_state`: 0 none, 1 moderate, 2 significant.
const BLOAT_SQL: &str = r#"
    select extract(epoch from now())::float8 as value,
           current_database()::text as datname,
           bdinspname::text as bdinspname,
           bdirelname::text as bdirelname,
           bdirelpages::text as bdirelpages,
           bdiexppages::text as bdiexppages,
           (case
               when position('moderate' in bdidiag) > 0 then 1
               when position('significant' in bdidiag) > 0 then 2
               else 0
            end)::text as bloat_state
    from gp_toolkit.gp_bloat_diag
    order by bloat_state desc"#;

/// Emits one sample per bloated heap table across all databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableBloatCollector;

#[async_trait]
impl PerDatabase<PgSession> for TableBloatCollector {
    async fn scrape_database(
        &self,
        target: &PgSession,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        query_into_sink(target, BLOAT_SQL, &HEAP_TABLE_BLOAT_DETAIL, sink).await?;
        Ok(())
    }
}

#[async_trait]
impl Collector<PgSession> for TableBloatCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        scrape_each_database(self, NAME, session, sink).await
    }
}
