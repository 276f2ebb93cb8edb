//! PostgreSQL Adapters - Greenplum over the Postgres Wire Protocol
//!
//! Implements the `Connector`, `DatabaseSession` and `Collector` ports
//! with sqlx. Every session is a single-connection pool.

pub mod collectors;
pub mod connector;
pub mod rows;

pub use collectors::{KNOWN_COLLECTORS, build_registry};
pub use connector::{PgConnector, PgSession};
