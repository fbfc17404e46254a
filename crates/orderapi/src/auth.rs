//! Client-credentials token exchange with caching.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::body_snippet;
use crate::{ApiConfig, AuthError, AuthToken, TokenSource};

/// Lifetime assumed when the token endpoint does not send `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// Obtains bearer tokens from `<base_url>/auth/token` and reuses them until
/// shortly before they expire.
///
/// The cache lock is held across the exchange, so concurrent callers wait
/// for one exchange instead of each starting their own.
pub struct AuthProvider {
    http: Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
    refresh_margin: Duration,
    cached: Mutex<Option<AuthToken>>,
}

impl AuthProvider {
    pub fn new(http: Client, config: &ApiConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint("auth/token"),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_margin: Duration::seconds(30),
            cached: Mutex::new(None),
        }
    }

    /// Treat tokens as expired this long before their actual expiry.
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    async fn exchange(&self) -> Result<AuthToken, AuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                grant_type: "client_credentials",
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("token request rejected: HTTP {}", status.as_u16());
            return Err(AuthError::Status {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(AuthError::Malformed("empty token".into()));
        }

        let expires_at = Duration::try_seconds(parsed.expires_in.max(0))
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::Malformed(format!("expires_in {} out of range", parsed.expires_in))
            })?;
        info!("new API token acquired, expires at {}", expires_at);
        Ok(AuthToken::new(parsed.token, expires_at))
    }
}

#[async_trait]
impl TokenSource for AuthProvider {
    async fn token(&self) -> Result<AuthToken, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now() + self.refresh_margin) {
                debug!("using cached API token");
                return Ok(token.clone());
            }
            debug!("cached API token expired");
        }

        let token = self.exchange().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        if self.cached.lock().await.take().is_some() {
            info!("cached API token invalidated");
        }
    }
}
