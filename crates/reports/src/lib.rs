//! `reports` crate: report definitions, order records, the config store and
//! the aggregator.
//!
//! Everything here is synchronous and free of I/O except [`ConfigStore`],
//! which reads and writes the report definitions file.

pub mod aggregate;
pub mod error;
pub mod models;
pub mod record;
pub mod store;

pub use aggregate::{aggregate, Summary, SummaryEntry, SummaryValue};
pub use error::{AggregateError, ConfigError};
pub use models::{
    EmailSpec, ReportArtifact, ReportConfig, ReportPeriod, SummaryField, SummaryOperation,
};
pub use record::{OrderRecord, Scalar};
pub use store::{ConfigStore, LoadReport, SkippedEntry};
