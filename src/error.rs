//! Error Taxonomy - Typed Failures for the Scrape Path
//!
//! Each layer owns one error enum. Only `ConnectionError` is allowed
//! to fail a whole cycle; everything a collector returns is absorbed
//! by the orchestrator and logged.

use std::fmt;

use thiserror::Error;

/// Driver-level failure talking to the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Error surfaced by the sqlx driver.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// Failure reported without a driver error (fakes, invalid options).
    #[error("database error: {0}")]
    Other(String),
}

impl DatabaseError {
    /// Build an error from a plain message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Failure while detecting the server major version.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The version query could not be executed.
    #[error("version query failed: {0}")]
    Unreachable(#[source] DatabaseError),
    /// The banner did not contain a recognizable product version.
    #[error("no Greenplum version found in banner {0:?}")]
    NoVersionMatch(String),
}

/// Failure to reach the `Verified` connection state.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Opening the physical connection failed.
    #[error("failed to open connection: {0}")]
    Open(#[source] DatabaseError),
    /// The connection opened but could not be verified.
    #[error("failed to verify connection: {0}")]
    Probe(#[source] ProbeError),
}

/// Failure inside one collector invocation.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A statement could not be executed, or the row stream broke.
    #[error("query failed: {0}")]
    Query(#[from] DatabaseError),
    /// A result row could not be decoded into a sample.
    #[error("failed to scan row {row}: {source}")]
    RowScan {
        /// Zero-based index of the row that failed.
        row: usize,
        /// Decode error reported by the driver.
        #[source]
        source: sqlx::Error,
    },
    /// One or more sub-targets failed; the others were still scraped.
    #[error("{}", TargetList(.0))]
    Targets(Vec<TargetFailure>),
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(DatabaseError::Sqlx(err))
    }
}

impl CollectorError {
    /// Fold per-target failures into a single result.
    pub fn from_targets(failures: Vec<TargetFailure>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self::Targets(failures))
        }
    }
}

/// A sub-target (usually a database) that failed during a multi-target scrape.
#[derive(Debug)]
pub struct TargetFailure {
    /// Sub-target name.
    pub target: String,
    /// What went wrong for it.
    pub error: CollectorError,
}

impl TargetFailure {
    /// Record a failure for the named target.
    pub fn new(target: impl Into<String>, error: impl Into<CollectorError>) -> Self {
        Self {
            target: target.into(),
            error: error.into(),
        }
    }
}

struct TargetList<'a>(&'a [TargetFailure]);

impl fmt::Display for TargetList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} target(s) failed", self.0.len())?;
        for failure in self.0 {
            write!(f, "; {}: {}", failure.target, failure.error)?;
        }
        Ok(())
    }
}
