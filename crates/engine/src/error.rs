//! Engine-level error types.

use std::path::PathBuf;

use mailer::DeliveryError;
use orderapi::{AuthError, QueryError};
use render::RenderError;
use reports::{AggregateError, ConfigError};
use thiserror::Error;

use crate::Stage;

/// Why a single stage attempt failed.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Deliver(#[from] DeliveryError),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decides whether a failed attempt is worth repeating.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StageFailure {
    /// Network trouble and server-side errors are transient. Client errors,
    /// data problems and local I/O are not.
    fn is_transient(&self) -> bool {
        match self {
            StageFailure::Auth(e) => e.is_transient(),
            StageFailure::Query(e) => e.is_transient(),
            StageFailure::Deliver(e) => e.is_transient(),
            StageFailure::Aggregate(_) | StageFailure::Render(_) | StageFailure::Io { .. } => {
                false
            }
        }
    }
}

/// Errors produced by a report run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The report cannot run as configured. Raised before any network call.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage gave up, either on a permanent error or after its retries.
    #[error("report '{report_id}' failed at {stage} after {attempts} attempt(s): {source}")]
    StageFailed {
        report_id: String,
        stage: Stage,
        attempts: u32,
        #[source]
        source: StageFailure,
    },
}

impl EngineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EngineError::StageFailed { stage, .. } => Some(*stage),
            EngineError::Config(_) => None,
        }
    }
}
