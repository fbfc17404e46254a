//! Run-level models: the pipeline stages and what a finished run reports.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reports::ReportPeriod;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One step of a report run. Runs always visit them in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Auth,
    Query,
    Aggregate,
    Render,
    Deliver,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Auth,
        Stage::Query,
        Stage::Aggregate,
        Stage::Render,
        Stage::Deliver,
        Stage::Cleanup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Auth => "auth",
            Stage::Query => "query",
            Stage::Aggregate => "aggregate",
            Stage::Render => "render",
            Stage::Deliver => "deliver",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StageRecord
// ---------------------------------------------------------------------------

/// How one completed stage went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis().try_into().unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// The outcome of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report_id: String,
    pub period: ReportPeriod,
    pub record_count: usize,
    pub recipients: Vec<String>,
    /// Where the mailer put the message (relay URL or outbox file).
    pub delivered_to: String,
    /// Set only when the rendered file was kept after delivery.
    pub artifact_path: Option<PathBuf>,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn attempts(&self, stage: Stage) -> Option<u32> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_serialize_in_snake_case() {
        let record = StageRecord {
            stage: Stage::Deliver,
            attempts: 2,
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "deliver");
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(Stage::ALL.map(Stage::as_str).join(">"), "auth>query>aggregate>render>deliver>cleanup");
    }
}
