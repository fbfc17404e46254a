//! Core report definitions.
//!
//! A [`ReportConfig`] is the unit everything else is keyed on: it says what
//! to query, which columns to print, which statistics to compute and who
//! receives the result. The JSON form is the one stored in the report
//! definitions file.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Query parameter that controls the report period instead of being sent to
/// the API.
pub const LOOKBACK_DAYS_KEY: &str = "lookback_days";

const MAX_LOOKBACK_DAYS: u64 = 366;

// ---------------------------------------------------------------------------
// Summary fields
// ---------------------------------------------------------------------------

/// Aggregate operation applied to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOperation {
    Sum,
    Count,
    #[serde(alias = "mean")]
    Avg,
    Min,
    Max,
    /// Value counts, drawn as a bar chart.
    Group,
}

impl fmt::Display for SummaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Count => write!(f, "count"),
            Self::Avg => write!(f, "avg"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// One configured statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryField {
    pub field: String,
    pub operation: SummaryOperation,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

fn default_subject() -> String {
    "{report_name} - {date}".to_owned()
}

fn default_body() -> String {
    "Please find attached the {report_name} for {date}.".to_owned()
}

/// Delivery target and message templates.
///
/// `subject` and `body` may contain `{date}`, `{report_name}` and
/// `{record_count}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSpec {
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
}

// ---------------------------------------------------------------------------
// ReportConfig
// ---------------------------------------------------------------------------

fn default_active() -> bool {
    true
}

/// A complete report definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub report_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cron expression handed to the external scheduler; never evaluated here.
    pub schedule: String,
    #[serde(default)]
    pub query_parameters: BTreeMap<String, serde_json::Value>,
    pub email: EmailSpec,
    pub report_fields: Vec<String>,
    #[serde(default)]
    pub summary_fields: Vec<SummaryField>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ReportConfig {
    /// Structural validation applied to every entry the store loads.
    ///
    /// # Errors
    /// The first violated rule, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let empty = |key: &'static str| ConfigError::EmptyKey {
            report_id: self.report_id.clone(),
            key,
        };

        if self.report_id.trim().is_empty() {
            return Err(empty("report_id"));
        }
        if self.name.trim().is_empty() {
            return Err(empty("name"));
        }
        if self.schedule.trim().is_empty() {
            return Err(empty("schedule"));
        }
        if self.report_fields.is_empty() {
            return Err(empty("report_fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.report_fields {
            if field.trim().is_empty() {
                return Err(empty("report_fields"));
            }
            if !seen.insert(field.as_str()) {
                return Err(ConfigError::DuplicateField {
                    report_id: self.report_id.clone(),
                    field: field.clone(),
                });
            }
        }

        for summary in &self.summary_fields {
            if !seen.contains(summary.field.as_str()) {
                return Err(ConfigError::SummaryFieldNotReported {
                    report_id: self.report_id.clone(),
                    field: summary.field.clone(),
                });
            }
        }

        if let Some(value) = self.query_parameters.get(LOOKBACK_DAYS_KEY) {
            match value.as_u64() {
                Some(days) if days <= MAX_LOOKBACK_DAYS => {}
                _ => {
                    return Err(ConfigError::InvalidParameter {
                        report_id: self.report_id.clone(),
                        key: LOOKBACK_DAYS_KEY.to_owned(),
                        reason: "must be an integer between 0 and 366",
                    })
                }
            }
        }

        for address in &self.email.recipients {
            let valid = address
                .split_once('@')
                .is_some_and(|(user, domain)| !user.trim().is_empty() && !domain.trim().is_empty());
            if !valid {
                return Err(ConfigError::InvalidRecipient {
                    report_id: self.report_id.clone(),
                    address: address.clone(),
                });
            }
        }

        Ok(())
    }

    /// Number of days before the run date covered by the report.
    pub fn lookback_days(&self) -> u64 {
        self.query_parameters
            .get(LOOKBACK_DAYS_KEY)
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1)
    }

    /// Period queried for a run on `run_date`.
    pub fn period_for(&self, run_date: NaiveDate) -> ReportPeriod {
        ReportPeriod::ending_before(run_date, self.lookback_days())
    }

    /// Query parameters forwarded to the order API, as strings.
    pub fn api_filters(&self) -> Vec<(String, String)> {
        self.query_parameters
            .iter()
            .filter(|(key, _)| key.as_str() != LOOKBACK_DAYS_KEY)
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ReportPeriod
// ---------------------------------------------------------------------------

/// Inclusive date range covered by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ReportPeriod {
    /// The `lookback_days` days before `run_date`. Zero means the run date
    /// itself.
    pub fn ending_before(run_date: NaiveDate, lookback_days: u64) -> Self {
        if lookback_days == 0 {
            return Self {
                from: run_date,
                to: run_date,
            };
        }
        let to = run_date.checked_sub_days(Days::new(1)).unwrap_or(run_date);
        let from = run_date
            .checked_sub_days(Days::new(lookback_days))
            .unwrap_or(to);
        Self { from, to }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from.format("%Y-%m-%d"))
        } else {
            write!(
                f,
                "{} to {}",
                self.from.format("%Y-%m-%d"),
                self.to.format("%Y-%m-%d")
            )
        }
    }
}

// ---------------------------------------------------------------------------
// ReportArtifact
// ---------------------------------------------------------------------------

/// A rendered report, ready to attach.
#[derive(Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    /// `<report_id>_<YYYYMMDD>.pdf`
    pub fn filename_for(report_id: &str, run_date: NaiveDate) -> String {
        format!("{report_id}_{}.pdf", run_date.format("%Y%m%d"))
    }
}

impl fmt::Debug for ReportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportArtifact")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ReportConfig {
        serde_json::from_value(json!({
            "report_id": "daily_orders",
            "name": "Daily Orders",
            "schedule": "0 6 * * *",
            "query_parameters": { "order_type": "Standard", "lookback_days": 7 },
            "email": { "recipients": ["ops@example.com"] },
            "report_fields": ["OrderId", "TotalValue"],
            "summary_fields": [
                { "field": "TotalValue", "operation": "sum", "label": "Total Revenue" }
            ]
        }))
        .expect("sample config decodes")
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let config = sample();
        assert!(config.active);
        assert_eq!(config.email.subject, "{report_name} - {date}");
        assert!(config.description.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mean_is_an_alias_for_avg() {
        let field: SummaryField = serde_json::from_value(
            json!({ "field": "TotalValue", "operation": "mean", "label": "Average" }),
        )
        .unwrap();
        assert_eq!(field.operation, SummaryOperation::Avg);
    }

    #[test]
    fn unknown_operation_fails_to_decode() {
        let result = serde_json::from_value::<SummaryField>(
            json!({ "field": "TotalValue", "operation": "median", "label": "Median" }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn summary_field_outside_report_fields_is_rejected() {
        let mut config = sample();
        config.summary_fields.push(SummaryField {
            field: "Discount".into(),
            operation: SummaryOperation::Sum,
            label: "Discounts".into(),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SummaryFieldNotReported { field, .. }) if field == "Discount"
        ));
    }

    #[test]
    fn duplicate_report_field_is_rejected() {
        let mut config = sample();
        config.report_fields.push("OrderId".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateField { field, .. }) if field == "OrderId"
        ));
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let mut config = sample();
        config.email.recipients.push("not-an-address".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRecipient { .. })
        ));
    }

    #[test]
    fn negative_lookback_is_rejected() {
        let mut config = sample();
        config
            .query_parameters
            .insert(LOOKBACK_DAYS_KEY.into(), json!(-3));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn api_filters_skip_lookback_and_stringify_values() {
        let mut config = sample();
        config.query_parameters.insert("max_count".into(), json!(500));
        let filters = config.api_filters();
        assert_eq!(
            filters,
            vec![
                ("max_count".to_owned(), "500".to_owned()),
                ("order_type".to_owned(), "Standard".to_owned()),
            ]
        );
    }

    #[test]
    fn period_covers_the_days_before_the_run() {
        let run = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let period = sample().period_for(run);
        assert_eq!(period.from, NaiveDate::from_ymd_opt(2026, 10, 9).unwrap());
        assert_eq!(period.to, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());

        let same_day = ReportPeriod::ending_before(run, 0);
        assert_eq!(same_day.from, run);
        assert_eq!(same_day.to, run);
        assert_eq!(same_day.to_string(), "2026-10-16");
    }

    #[test]
    fn artifact_filename_uses_compact_date() {
        let run = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            ReportArtifact::filename_for("daily_orders", run),
            "daily_orders_20260105.pdf"
        );
    }
}
