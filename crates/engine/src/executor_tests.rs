//! End-to-end tests for the report executor.
//!
//! These tests use the `orderapi` and `mailer` test doubles, so no order API
//! or SMTP relay is required. Rendered files go to a temporary directory.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use mailer::mock::{MailerBehaviour, RecordingMailer};
use orderapi::mock::{MockOrderSource, MockOutcome, MockTokenSource};
use reports::{ConfigError, ConfigStore, OrderRecord, ReportConfig, SummaryValue};
use serde_json::json;

use crate::{EngineError, ExecutorConfig, ReportExecutor, RetryPolicies, Stage, StageFailure};

struct Harness {
    tokens: MockTokenSource,
    orders: MockOrderSource,
    mailer: RecordingMailer,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(orders: MockOrderSource, mailer: RecordingMailer) -> Self {
        Self {
            tokens: MockTokenSource::returning("tkn"),
            orders,
            mailer,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn executor(&self) -> ReportExecutor {
        self.executor_with(|_| {})
    }

    fn executor_with(&self, tweak: impl FnOnce(&mut ExecutorConfig)) -> ReportExecutor {
        let mut config = ExecutorConfig {
            output_dir: self.dir.path().to_path_buf(),
            default_recipients: Vec::new(),
            keep_artifacts: false,
            retry: RetryPolicies::immediate(),
        };
        tweak(&mut config);
        ReportExecutor::new(
            Arc::new(self.tokens.clone()),
            Arc::new(self.orders.clone()),
            Arc::new(self.mailer.clone()),
            config,
        )
    }

    fn artifact(&self) -> std::path::PathBuf {
        self.dir.path().join("daily_orders_20261016.pdf")
    }
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn report() -> ReportConfig {
    serde_json::from_value(json!({
        "report_id": "daily_orders",
        "name": "Daily Orders",
        "schedule": "0 6 * * *",
        "query_parameters": { "order_type": "Standard" },
        "email": {
            "recipients": ["ops@example.com"],
            "subject": "{report_name} - {date}",
            "body": "{record_count} orders attached."
        },
        "report_fields": ["OrderId", "Status", "TotalValue"],
        "summary_fields": [
            { "field": "TotalValue", "operation": "sum", "label": "Total Revenue" },
            { "field": "OrderId", "operation": "count", "label": "Orders" }
        ]
    }))
    .unwrap()
}

fn records() -> Vec<OrderRecord> {
    vec![
        OrderRecord::new()
            .with("OrderId", 1)
            .with("Status", "Shipped")
            .with("TotalValue", 10),
        OrderRecord::new()
            .with("OrderId", 2)
            .with("Status", "Open")
            .with("TotalValue", 20),
    ]
}

fn assert_stage_failed(err: &EngineError, expected: Stage, expected_attempts: u32) {
    match err {
        EngineError::StageFailed {
            stage, attempts, ..
        } => {
            assert_eq!(*stage, expected);
            assert_eq!(*attempts, expected_attempts);
        }
        other => panic!("expected a {expected} failure, got {other:?}"),
    }
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

// ============================================================
// Happy path
// ============================================================

#[tokio::test]
async fn successful_run_delivers_and_removes_the_artifact() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );

    let summary = h.executor().run(&report(), run_date()).await.unwrap();

    assert_eq!(summary.report_id, "daily_orders");
    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.recipients, ["ops@example.com"]);
    assert!(summary.artifact_path.is_none());
    assert_eq!(
        summary.stages.iter().map(|s| s.stage).collect::<Vec<_>>(),
        Stage::ALL
    );
    assert!(summary.stages.iter().all(|s| s.attempts == 1));

    let sent = h.mailer.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Daily Orders - 2026-10-16");
    assert_eq!(sent[0].body, "2 orders attached.");
    assert_eq!(sent[0].attachment.filename, "daily_orders_20261016.pdf");
    assert!(sent[0].attachment.bytes.starts_with(b"%PDF"));

    assert!(!h.artifact().exists());
    assert_eq!(files_in(h.dir.path()), 0);
}

#[tokio::test]
async fn query_covers_the_previous_day_with_filters() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );

    h.executor().run(&report(), run_date()).await.unwrap();

    let queries = h.orders.queries.lock().unwrap();
    let day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
    assert_eq!(queries[0].period.from, day);
    assert_eq!(queries[0].period.to, day);
    assert_eq!(queries[0].filters, [("order_type".to_owned(), "Standard".to_owned())]);
}

#[tokio::test]
async fn keep_artifacts_leaves_the_file_in_place() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );

    let summary = h
        .executor_with(|c| c.keep_artifacts = true)
        .run(&report(), run_date())
        .await
        .unwrap();

    assert_eq!(summary.artifact_path.as_deref(), Some(h.artifact().as_path()));
    assert!(h.artifact().exists());
}

#[tokio::test]
async fn empty_result_still_produces_a_report() {
    let h = Harness::new(
        MockOrderSource::returning(Vec::new()),
        RecordingMailer::accepting(),
    );

    let summary = h.executor().run(&report(), run_date()).await.unwrap();

    assert_eq!(summary.record_count, 0);
    assert_eq!(h.mailer.sent_emails().len(), 1);
}

// ============================================================
// Retry behaviour
// ============================================================

#[tokio::test]
async fn client_error_is_attempted_once() {
    let h = Harness::new(MockOrderSource::failing_status(400), RecordingMailer::accepting());

    let err = h.executor().run(&report(), run_date()).await.unwrap_err();

    assert_stage_failed(&err, Stage::Query, 1);
    assert_eq!(h.orders.call_count(), 1);
    assert_eq!(h.mailer.attempt_count(), 0);
}

#[tokio::test]
async fn server_error_is_retried_once() {
    let h = Harness::new(
        MockOrderSource::scripted(vec![
            MockOutcome::FailStatus(503),
            MockOutcome::Succeed(records()),
        ]),
        RecordingMailer::accepting(),
    );

    let summary = h.executor().run(&report(), run_date()).await.unwrap();

    assert_eq!(summary.attempts(Stage::Query), Some(2));
    assert_eq!(h.orders.call_count(), 2);
}

#[tokio::test]
async fn persistent_server_error_gives_up_after_the_retry() {
    let h = Harness::new(MockOrderSource::failing_status(502), RecordingMailer::accepting());

    let err = h.executor().run(&report(), run_date()).await.unwrap_err();

    assert_stage_failed(&err, Stage::Query, 2);
    assert_eq!(h.orders.call_count(), 2);
}

#[tokio::test]
async fn auth_failure_stops_before_querying() {
    let mut h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );
    h.tokens = MockTokenSource::scripted(vec![MockOutcome::FailStatus(403)]);

    let err = h.executor().run(&report(), run_date()).await.unwrap_err();

    assert_stage_failed(&err, Stage::Auth, 1);
    assert!(matches!(
        err,
        EngineError::StageFailed {
            source: StageFailure::Auth(_),
            ..
        }
    ));
    assert_eq!(h.orders.call_count(), 0);
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let h = Harness::new(
        MockOrderSource::scripted(vec![
            MockOutcome::FailStatus(401),
            MockOutcome::Succeed(records()),
        ]),
        RecordingMailer::accepting(),
    );

    let summary = h.executor().run(&report(), run_date()).await.unwrap();

    assert_eq!(summary.attempts(Stage::Query), Some(1));
    assert_eq!(h.tokens.invalidation_count(), 1);
    assert_eq!(h.tokens.call_count(), 2);
    assert_eq!(h.orders.call_count(), 2);
}

// ============================================================
// Delivery and artifact lifecycle
// ============================================================

#[tokio::test]
async fn failed_delivery_keeps_the_artifact() {
    let h = Harness::new(MockOrderSource::returning(records()), RecordingMailer::rejecting(550));

    let err = h.executor().run(&report(), run_date()).await.unwrap_err();

    assert_stage_failed(&err, Stage::Deliver, 1);
    assert!(h.artifact().exists());
}

#[tokio::test]
async fn transient_delivery_failure_is_retried() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::with_behaviour(MailerBehaviour::RejectFirst(1, 421)),
    );

    let summary = h.executor().run(&report(), run_date()).await.unwrap();

    assert_eq!(summary.attempts(Stage::Deliver), Some(2));
    assert_eq!(h.mailer.sent_emails().len(), 1);
    assert!(!h.artifact().exists());
}

// ============================================================
// Refusals before any network call
// ============================================================

#[tokio::test]
async fn inactive_report_is_refused() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );
    let mut report = report();
    report.active = false;

    let err = h.executor().run(&report, run_date()).await.unwrap_err();

    assert!(matches!(err, EngineError::Config(ConfigError::Inactive(_))));
    assert_eq!(h.tokens.call_count(), 0);
}

#[tokio::test]
async fn missing_recipients_fail_before_fetching() {
    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );
    let mut report = report();
    report.email.recipients.clear();

    let err = h.executor().run(&report, run_date()).await.unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::NoRecipients { .. })));
    assert_eq!(h.tokens.call_count(), 0);

    let summary = h
        .executor_with(|c| c.default_recipients = vec!["fallback@example.com".into()])
        .run(&report, run_date())
        .await
        .unwrap();
    assert_eq!(summary.recipients, ["fallback@example.com"]);
}

#[tokio::test]
async fn missing_summary_field_fails_aggregation_without_retry() {
    let h = Harness::new(
        MockOrderSource::returning(vec![OrderRecord::new().with("OrderId", 1)]),
        RecordingMailer::accepting(),
    );

    let err = h.executor().run(&report(), run_date()).await.unwrap_err();

    assert_stage_failed(&err, Stage::Aggregate, 1);
    assert_eq!(h.mailer.attempt_count(), 0);
    assert_eq!(files_in(h.dir.path()), 0);
}

// ============================================================
// run_all
// ============================================================

#[tokio::test]
async fn one_failing_report_does_not_stop_the_others() {
    let mut broken = report();
    broken.report_id = "broken_orders".into();
    broken.summary_fields[0].field = "Status".into();
    broken.summary_fields[0].label = "Status Total".into();

    let mut store = ConfigStore::empty();
    store.upsert(report()).unwrap();
    store.upsert(broken).unwrap();

    let h = Harness::new(
        MockOrderSource::returning(records()),
        RecordingMailer::accepting(),
    );
    let outcomes = h.executor().run_all(&store, run_date()).await;

    assert_eq!(outcomes.len(), 2);
    let (id, first) = &outcomes[0];
    assert_eq!(id, "broken_orders");
    assert!(matches!(
        first,
        Err(EngineError::StageFailed {
            stage: Stage::Aggregate,
            ..
        })
    ));
    let (id, second) = &outcomes[1];
    assert_eq!(id, "daily_orders");
    assert!(second.is_ok());
    assert_eq!(h.mailer.sent_emails().len(), 1);
}

#[test]
fn summary_of_sample_records_is_thirty() {
    let summary = reports::aggregate(&records(), &report().summary_fields).unwrap();
    assert_eq!(summary.get("Total Revenue"), Some(&SummaryValue::Number(30.0)));
}
