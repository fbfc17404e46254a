//! `engine` crate: the report pipeline: stages, retry policy, the executor
//! and maintenance checks.

pub mod error;
pub mod executor;
pub mod maintenance;
pub mod models;
pub mod retry;

pub use error::{EngineError, StageFailure, Transient};
pub use executor::{ExecutorConfig, ReportExecutor};
pub use maintenance::{check_connectivity, ConnectivityReport};
pub use models::{RunSummary, Stage, StageRecord};
pub use retry::{RetryPolicies, RetryPolicy};

#[cfg(test)]
mod executor_tests;
