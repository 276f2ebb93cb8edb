//! Domain layer - Core value types of a scrape.
//!
//! Pure types with no I/O: detected server versions, dialect
//! selection tables, metric descriptors and samples.
//! Everything here is testable in isolation.

pub mod sample;
pub mod version;

// Re-export core types for convenience
pub use sample::{MetricDesc, MetricSample, SampleSink};
pub use version::{Dialect, DialectTable, ServerVersion};
