//! Error types for report configuration and aggregation.

use std::path::PathBuf;

use thiserror::Error;

/// A report definition is missing, unreadable, or structurally invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read report config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The top-level JSON value is neither an array nor `{"reports": [...]}`.
    #[error("unexpected report config layout: {0}")]
    Layout(String),

    #[error("entry could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("report '{report_id}': required key '{key}' is empty")]
    EmptyKey { report_id: String, key: &'static str },

    #[error("report '{report_id}': report field '{field}' is listed twice")]
    DuplicateField { report_id: String, field: String },

    #[error("report '{report_id}': summary field '{field}' is not one of the report fields")]
    SummaryFieldNotReported { report_id: String, field: String },

    #[error("report '{report_id}': query parameter '{key}' {reason}")]
    InvalidParameter {
        report_id: String,
        key: String,
        reason: &'static str,
    },

    #[error("report '{report_id}': invalid recipient address '{address}'")]
    InvalidRecipient { report_id: String, address: String },

    #[error("report '{report_id}' has no recipients and no default recipients are configured")]
    NoRecipients { report_id: String },

    #[error("unknown report '{0}'")]
    UnknownReport(String),

    #[error("report '{0}' is inactive")]
    Inactive(String),
}

/// The queried records do not have the shape the summary fields expect.
///
/// Aggregation errors are data problems: retrying the run would not help.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("record {index} has no field '{field}'")]
    MissingField { field: String, index: usize },

    #[error("record {index}: field '{field}' holds non-numeric value '{value}'")]
    NonNumeric {
        field: String,
        index: usize,
        value: String,
    },
}
