//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (sqlx, axum, prometheus). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus exposition endpoint and health probes
//! - `postgres`: Greenplum connector, session and collectors

pub mod metrics;
pub mod postgres;
