//! Session memory consumption across segments.

use async_trait::async_trait;

use super::query_into_sink;
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{Dialect, DialectTable, MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "session_memory";

static SESSION_MEMORY_DETAIL: MetricDesc = MetricDesc::gauge(
    "greenplum_server_session_memory_detail",
    "Sessions memory usage detail for all running sessions",
    &[
        "pid",
        "sess_id",
        "datname",
        "usename",
        "vmem_max_seg",
        "vmem_avg",
        "vmem_total",
        "query",
    ],
);

const SESSION_MEMORY_SQL_V6: &str = r#"
    select extract(epoch from now())::float8 as value,
           b.pid::text as pid,
           b.sess_id::text as sess_id,
           b.datname::text as datname,
           b.usename::text as usename,
           max(a.vmem_mb)::text as vmem_max_seg,
           round(avg(a.vmem_mb))::text as vmem_avg,
           sum(a.vmem_mb)::text as vmem_total,
           b.query::text as query
    from session_state.session_level_memory_consumption a
    join pg_stat_activity b on a.sess_id = b.sess_id
    where b.pid <> pg_backend_pid()
      and b.datname is not null
    group by b.pid, b.sess_id, b.datname, b.usename, b.query"#;

const SESSION_MEMORY_SQL_V5: &str = r#"
    select extract(epoch from now())::float8 as value,
           b.procpid::text as pid,
           a.sess_id::text as sess_id,
           a.datname::text as datname,
           a.usename::text as usename,
           max(a.vmem_mb)::text as vmem_max_seg,
           round(avg(a.vmem_mb))::text as vmem_avg,
           sum(a.vmem_mb)::text as vmem_total,
           a.current_query::text as query
    from session_state.session_level_memory_consumption a
    join pg_stat_activity b on a.sess_id = b.sess_id
    where b.procpid <> pg_backend_pid()
    group by b.procpid, a.sess_id, a.datname, a.usename, a.current_query"#;

// The session_state view first shipped in 4.x; earlier majors fall back to
// the current text like any other unknown version.
static SESSION_MEMORY_SQL: DialectTable<&str> = DialectTable::new(
    &[Dialect {
        versions: 4..6,
        value: SESSION_MEMORY_SQL_V5,
    }],
    SESSION_MEMORY_SQL_V6,
);

/// Emits one sample per session with its vmem usage as labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMemoryCollector;

#[async_trait]
impl Collector<PgSession> for SessionMemoryCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        let sql = *SESSION_MEMORY_SQL.select(version);
        query_into_sink(session, sql, &SESSION_MEMORY_DETAIL, sink).await?;
        Ok(())
    }
}
