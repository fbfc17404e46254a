//! Test doubles for [`TokenSource`] and [`OrderSource`].
//!
//! Useful wherever the pipeline needs to run without a live order API. Each
//! double records how often it was called and replays a scripted sequence
//! of outcomes; once the script runs out the last outcome repeats.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reports::OrderRecord;

use crate::{AuthError, AuthToken, OrderQuery, OrderSource, QueryError, TokenSource};

/// Outcome a mock replays on one call.
#[derive(Debug, Clone)]
pub enum MockOutcome<T> {
    Succeed(T),
    /// Fail with the given HTTP status.
    FailStatus(u16),
    /// Fail with an undecodable-response error.
    FailMalformed(String),
}

#[derive(Debug)]
struct Script<T> {
    outcomes: VecDeque<MockOutcome<T>>,
    last: Option<MockOutcome<T>>,
}

impl<T: Clone> Script<T> {
    fn new(outcomes: Vec<MockOutcome<T>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            last: None,
        }
    }

    fn next(&mut self) -> Option<MockOutcome<T>> {
        if let Some(outcome) = self.outcomes.pop_front() {
            self.last = Some(outcome);
        }
        self.last.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MockTokenSource
// ---------------------------------------------------------------------------

/// A token source that never touches the network.
#[derive(Debug, Clone)]
pub struct MockTokenSource {
    script: Arc<Mutex<Script<String>>>,
    calls: Arc<Mutex<usize>>,
    invalidations: Arc<Mutex<usize>>,
}

impl MockTokenSource {
    /// Always hands out `secret`, valid for an hour.
    pub fn returning(secret: impl Into<String>) -> Self {
        Self::scripted(vec![MockOutcome::Succeed(secret.into())])
    }

    /// Replays `outcomes` in order.
    pub fn scripted(outcomes: Vec<MockOutcome<String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(outcomes))),
            calls: Arc::new(Mutex::new(0)),
            invalidations: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.calls)
    }

    pub fn invalidation_count(&self) -> usize {
        *lock(&self.invalidations)
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn token(&self) -> Result<AuthToken, AuthError> {
        *lock(&self.calls) += 1;
        match lock(&self.script).next() {
            Some(MockOutcome::Succeed(secret)) => {
                Ok(AuthToken::new(secret, Utc::now() + Duration::hours(1)))
            }
            Some(MockOutcome::FailStatus(status)) => Err(AuthError::Status {
                status,
                body: "mock failure".into(),
            }),
            Some(MockOutcome::FailMalformed(msg)) => Err(AuthError::Malformed(msg)),
            None => Err(AuthError::MissingCredentials),
        }
    }

    async fn invalidate(&self) {
        *lock(&self.invalidations) += 1;
    }
}

// ---------------------------------------------------------------------------
// MockOrderSource
// ---------------------------------------------------------------------------

/// An order source that returns canned records.
#[derive(Debug, Clone)]
pub struct MockOrderSource {
    script: Arc<Mutex<Script<Vec<OrderRecord>>>>,
    /// Every query received, in call order.
    pub queries: Arc<Mutex<Vec<OrderQuery>>>,
    probes: Arc<Mutex<usize>>,
}

impl MockOrderSource {
    /// Always returns `records`.
    pub fn returning(records: Vec<OrderRecord>) -> Self {
        Self::scripted(vec![MockOutcome::Succeed(records)])
    }

    /// Always fails with `status`.
    pub fn failing_status(status: u16) -> Self {
        Self::scripted(vec![MockOutcome::FailStatus(status)])
    }

    /// Replays `outcomes` in order.
    pub fn scripted(outcomes: Vec<MockOutcome<Vec<OrderRecord>>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::new(outcomes))),
            queries: Arc::new(Mutex::new(Vec::new())),
            probes: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of searches run.
    pub fn call_count(&self) -> usize {
        lock(&self.queries).len()
    }

    pub fn probe_count(&self) -> usize {
        *lock(&self.probes)
    }

    fn next_outcome(&self) -> Result<Vec<OrderRecord>, QueryError> {
        match lock(&self.script).next() {
            Some(MockOutcome::Succeed(records)) => Ok(records),
            Some(MockOutcome::FailStatus(status)) => Err(QueryError::Status {
                status,
                body: "mock failure".into(),
            }),
            Some(MockOutcome::FailMalformed(msg)) => Err(QueryError::Malformed(msg)),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl OrderSource for MockOrderSource {
    async fn search(
        &self,
        _token: &AuthToken,
        query: &OrderQuery,
    ) -> Result<Vec<OrderRecord>, QueryError> {
        lock(&self.queries).push(query.clone());
        self.next_outcome()
    }

    async fn probe(&self, _token: &AuthToken) -> Result<(), QueryError> {
        *lock(&self.probes) += 1;
        self.next_outcome().map(|_| ())
    }
}
