//! Per-stage retry policies with exponential back-off.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Transient;
use crate::Stage;

fn default_base_delay_ms() -> u64 {
    500
}

/// How often and how patiently one stage is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further one.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay_ms: 0,
    };

    pub fn once(base_delay: Duration) -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: base_delay.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// A policy for every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub auth: RetryPolicy,
    pub query: RetryPolicy,
    pub aggregate: RetryPolicy,
    pub render: RetryPolicy,
    pub deliver: RetryPolicy,
}

impl Default for RetryPolicies {
    /// One retry for the stages that talk to the network, none otherwise.
    fn default() -> Self {
        let once = RetryPolicy::once(Duration::from_millis(default_base_delay_ms()));
        Self {
            auth: once,
            query: once,
            aggregate: RetryPolicy::NONE,
            render: RetryPolicy::NONE,
            deliver: once,
        }
    }
}

impl RetryPolicies {
    /// Same as the defaults but without waiting between attempts.
    pub fn immediate() -> Self {
        let mut policies = Self::default();
        for policy in [&mut policies.auth, &mut policies.query, &mut policies.deliver] {
            policy.base_delay_ms = 0;
        }
        policies
    }

    pub fn for_stage(&self, stage: Stage) -> RetryPolicy {
        match stage {
            Stage::Auth => self.auth,
            Stage::Query => self.query,
            Stage::Aggregate => self.aggregate,
            Stage::Render => self.render,
            Stage::Deliver => self.deliver,
            Stage::Cleanup => RetryPolicy::NONE,
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or runs out of
/// retries. Returns the number of attempts made alongside the outcome.
pub async fn execute_with_retry<T, E, F, Fut>(
    stage: Stage,
    report_id: &str,
    policy: RetryPolicy,
    mut attempt: F,
) -> (Result<T, E>, u32)
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return (Ok(value), attempts),
            Err(err) if err.is_transient() && attempts <= policy.max_retries => {
                let delay = policy.delay_for(attempts);
                warn!(
                    "report '{}' {} failed (attempt {}/{}), retrying in {:?}: {}",
                    report_id,
                    stage,
                    attempts,
                    policy.max_retries + 1,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return (Err(err), attempts),
        }
    }
}
