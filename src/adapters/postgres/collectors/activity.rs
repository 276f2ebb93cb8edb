//! Session activity detail from `pg_stat_activity`.

use async_trait::async_trait;

use super::query_into_sink;
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{Dialect, DialectTable, MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "activity";

static ACTIVITY_DETAIL: MetricDesc = MetricDesc::gauge(
    "greenplum_server_activity_detail",
    "Processes detail for Greenplum database",
    &[
        "datname",
        "pid",
        "sess_id",
        "usename",
        "application_name",
        "client_addr",
        "start_time",
        "duration",
        "waiting",
        "query",
        "waiting_reason",
        "rsgname",
        "rsgqueueduration",
    ],
);

const ACTIVITY_SQL_V6: &str = r#"
    select extract(epoch from now())::float8 as value,
           datname::text as datname,
           pid::text as pid,
           sess_id::text as sess_id,
           usename::text as usename,
           application_name::text as application_name,
           client_addr::text as client_addr,
           least(query_start, xact_start)::text as start_time,
           round(extract(epoch from (now() - query_start)))::text as duration,
           waiting::text as waiting,
           query::text as query,
           waiting_reason::text as waiting_reason,
           rsgname::text as rsgname,
           rsgqueueduration::text as rsgqueueduration
    from pg_stat_activity
    where pid <> pg_backend_pid()
    order by least(query_start, xact_start)"#;

// 5.x still exposes procpid / current_query.
const ACTIVITY_SQL_V5: &str = r#"
    select extract(epoch from now())::float8 as value,
           datname::text as datname,
           procpid::text as pid,
           sess_id::text as sess_id,
           usename::text as usename,
           application_name::text as application_name,
           client_addr::text as client_addr,
           least(query_start, xact_start)::text as start_time,
           round(extract(epoch from (now() - query_start)))::text as duration,
           waiting::text as waiting,
           current_query::text as query,
           waiting_reason::text as waiting_reason,
           rsgname::text as rsgname,
           rsgqueueduration::text as rsgqueueduration
    from pg_stat_activity
    where procpid <> pg_backend_pid()
    order by least(query_start, xact_start)"#;

static ACTIVITY_SQL: DialectTable<&str> = DialectTable::new(
    &[Dialect {
        versions: 0..6,
        value: ACTIVITY_SQL_V5,
    }],
    ACTIVITY_SQL_V6,
);

/// Emits one sample per backend, valued at the scrape timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityCollector;

#[async_trait]
impl Collector<PgSession> for ActivityCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        query_into_sink(session, *ACTIVITY_SQL.select(version), &ACTIVITY_DETAIL, sink).await?;
        Ok(())
    }
}
