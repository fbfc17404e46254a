//! The seams between the pipeline and the order API.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reports::{OrderRecord, ReportConfig, ReportPeriod};

use crate::{AuthError, QueryError};

/// A bearer token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Still usable at `at`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One search: a period, filters and the columns wanted back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub period: ReportPeriod,
    pub filters: Vec<(String, String)>,
    pub fields: Vec<String>,
}

impl OrderQuery {
    /// The search a report needs for a run on `run_date`.
    pub fn for_report(config: &ReportConfig, run_date: NaiveDate) -> Self {
        Self {
            period: config.period_for(run_date),
            filters: config.api_filters(),
            fields: config.report_fields.clone(),
        }
    }
}

/// Supplies bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A token that is valid now.
    async fn token(&self) -> Result<AuthToken, AuthError>;

    /// Forget any cached token so the next call performs a fresh exchange.
    async fn invalidate(&self) {}
}

/// Runs order searches.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Every record matching `query`, across all pages, in API order.
    async fn search(
        &self,
        token: &AuthToken,
        query: &OrderQuery,
    ) -> Result<Vec<OrderRecord>, QueryError>;

    /// Cheapest possible authenticated call, used by the connectivity check.
    async fn probe(&self, token: &AuthToken) -> Result<(), QueryError>;
}
