//! Operational checks that sit beside the report pipeline.

use std::time::{Duration, Instant};

use orderapi::{OrderSource, TokenSource};
use tracing::{error, info, instrument};

use crate::error::StageFailure;
use crate::Stage;

/// Outcome of [`check_connectivity`].
#[derive(Debug)]
pub struct ConnectivityReport {
    /// Time to obtain a token.
    pub auth_latency: Option<Duration>,
    /// Time for the probe search.
    pub probe_latency: Option<Duration>,
    /// The stage that failed and why, if anything did.
    pub failure: Option<(Stage, StageFailure)>,
}

impl ConnectivityReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn total_latency(&self) -> Duration {
        self.auth_latency.unwrap_or_default() + self.probe_latency.unwrap_or_default()
    }
}

/// Obtain a token and run the cheapest authenticated search. Never retries;
/// the point is to see the API as a run would on its first attempt.
#[instrument(skip_all)]
pub async fn check_connectivity(
    tokens: &dyn TokenSource,
    orders: &dyn OrderSource,
) -> ConnectivityReport {
    let mut report = ConnectivityReport {
        auth_latency: None,
        probe_latency: None,
        failure: None,
    };

    let started = Instant::now();
    let token = match tokens.token().await {
        Ok(token) => token,
        Err(err) => {
            error!("authentication failed: {err}");
            report.failure = Some((Stage::Auth, err.into()));
            return report;
        }
    };
    report.auth_latency = Some(started.elapsed());

    let started = Instant::now();
    match orders.probe(&token).await {
        Ok(()) => {
            report.probe_latency = Some(started.elapsed());
            info!(
                "order API reachable: auth {:?}, probe {:?}",
                report.auth_latency.unwrap_or_default(),
                report.probe_latency.unwrap_or_default()
            );
        }
        Err(err) => {
            error!("probe search failed: {err}");
            report.failure = Some((Stage::Query, err.into()));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderapi::mock::{MockOrderSource, MockTokenSource};

    #[tokio::test]
    async fn healthy_api_reports_both_latencies() {
        let tokens = MockTokenSource::returning("tkn");
        let orders = MockOrderSource::returning(Vec::new());

        let report = check_connectivity(&tokens, &orders).await;

        assert!(report.is_ok());
        assert!(report.auth_latency.is_some());
        assert!(report.probe_latency.is_some());
        assert_eq!(orders.probe_count(), 1);
    }

    #[tokio::test]
    async fn auth_failure_skips_the_probe() {
        let tokens = MockTokenSource::scripted(vec![orderapi::mock::MockOutcome::FailStatus(401)]);
        let orders = MockOrderSource::returning(Vec::new());

        let report = check_connectivity(&tokens, &orders).await;

        assert!(matches!(report.failure, Some((Stage::Auth, StageFailure::Auth(_)))));
        assert_eq!(orders.probe_count(), 0);
    }

    #[tokio::test]
    async fn probe_failure_is_reported_as_query() {
        let tokens = MockTokenSource::returning("tkn");
        let orders = MockOrderSource::failing_status(503);

        let report = check_connectivity(&tokens, &orders).await;

        assert!(matches!(report.failure, Some((Stage::Query, StageFailure::Query(_)))));
        assert!(report.probe_latency.is_none());
    }
}
