//! Database Port - Connection Establishment Interface
//!
//! The scrape core owns exactly one session at a time. It only needs
//! to open one, ask it for its version banner, and close it; collectors
//! that run real queries work against the concrete session type.

use async_trait::async_trait;

use crate::error::DatabaseError;

/// One live session to the database.
///
/// Sessions are shared read-only with collectors for the duration of a
/// cycle; only the connection manager opens and closes them.
#[async_trait]
pub trait DatabaseSession: Send + Sync + 'static {
    /// Run the fixed introspection query and return the raw banner.
    async fn version_banner(&self) -> Result<String, DatabaseError>;

    /// Close the session and release its physical connection.
    async fn close(&self);
}

/// Factory for sessions against the configured endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Session type produced by this connector.
    type Session: DatabaseSession;

    /// Open a new session capped at one physical connection.
    async fn open(&self) -> Result<Self::Session, DatabaseError>;
}
