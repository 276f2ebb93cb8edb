//! Notable master log entries from the last day.
//!
//! Picks destructive statements (`delete from`, `drop`, `truncate`),
//! errors, and statements that ran longer than a minute.

use async_trait::async_trait;

use super::query_into_sink;
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "master_log";

static MASTER_LOG_DETAIL: MetricDesc = MetricDesc::gauge(
    "greenplum_server_master_log_detail",
    "Master log for Greenplum database",
    &[
        "logtime",
        "loguser",
        "logdatabase",
        "loghost",
        "logsession",
        "logcmdcount",
        "logseverity",
        "logmessage",
        "logdebug",
        "logduration",
    ],
);

const MASTER_LOG_SQL: &str = r#"
    select extract(epoch from now())::float8 as value,
           a.logtime::text as logtime,
           a.loguser::text as loguser,
           a.logdatabase::text as logdatabase,
           a.loghost::text as loghost,
           a.logsession::text as logsession,
           a.logcmdcount::text as logcmdcount,
           a.logseverity::text as logseverity,
           a.logmessage::text as logmessage,
           a.logdebug::text as logdebug,
           b.logduration::text as logduration
    from gp_toolkit.__gp_log_master_ext a
    join gp_toolkit.gp_log_command_timings b
      on a.logsession = b.logsession
     and a.logcmdcount = b.logcmdcount
    where a.logtime > now() - interval '1 day'
      and (
            lower(a.logmessage) like '%delete from%'
         or lower(a.logmessage) like '%drop %'
         or lower(a.logmessage) like '%truncate %'
         or a.logseverity = 'ERROR'
         or b.logduration > '1 minute'
      )
      and a.logmessage not like '%gp_toolkit%'
      and a.logmessage not like 'successfully allocated xid%'
      and a.logdatabase <> 'postgres'
    order by a.logtime desc"#;

/// Emits one sample per matching log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterLogCollector;

#[async_trait]
impl Collector<PgSession> for MasterLogCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        query_into_sink(session, MASTER_LOG_SQL, &MASTER_LOG_DETAIL, sink).await?;
        Ok(())
    }
}
