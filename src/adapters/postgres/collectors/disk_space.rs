//! Free disk space per segment host, from `gp_toolkit.gp_disk_free`.

use async_trait::async_trait;

use super::query_into_sink;
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "disk_space";

static SPACE_AVAIL_GB: MetricDesc = MetricDesc::gauge(
    "greenplum_node_space_avail_gb",
    "Total GB available in the file system",
    &["hostname", "device"],
);

const DISK_FREE_SQL: &str = r#"
    select distinct dfhostname::text as hostname,
           dfdevice::text as device,
           (dfspace / 1024 / 1024)::float8 as value
    from gp_toolkit.gp_disk_free
    order by 1, 2"#;

/// Emits available GB per host and device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSpaceCollector;

#[async_trait]
impl Collector<PgSession> for DiskSpaceCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        query_into_sink(session, DISK_FREE_SQL, &SPACE_AVAIL_GB, sink).await?;
        Ok(())
    }
}
