//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the scrape use cases require
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Connector` / `DatabaseSession`: the one database connection
//! - `Collector`: per-domain metric producers and their registry

pub mod collector;
pub mod database;

pub use collector::{Collector, CollectorRegistry};
pub use database::{Connector, DatabaseSession};
