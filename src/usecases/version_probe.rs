//! Version Probe - Server Dialect Detection
//!
//! Runs the fixed `select version()` query and extracts the Greenplum
//! major version. Doubles as the liveness check for a held session.
//! Never retries; that policy lives in the connection manager.

use tracing::{debug, instrument};

use crate::domain::ServerVersion;
use crate::error::ProbeError;
use crate::ports::DatabaseSession;

/// Stateless version detector.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionProbe;

impl VersionProbe {
    /// Probe `session` for its major version.
    #[instrument(skip_all)]
    pub async fn probe<S: DatabaseSession>(session: &S) -> Result<ServerVersion, ProbeError> {
        let banner = session
            .version_banner()
            .await
            .map_err(ProbeError::Unreachable)?;

        let version =
            ServerVersion::from_banner(&banner).ok_or(ProbeError::NoVersionMatch(banner))?;

        debug!(version = %version, "Server version detected");
        Ok(version)
    }
}
