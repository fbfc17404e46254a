//! Errors raised while talking to the order API.
//!
//! Both enums expose `is_transient`, which the pipeline's retry policy uses:
//! network failures, timeouts and 5xx responses are worth one more attempt,
//! 4xx responses and undecodable bodies are not.

use thiserror::Error;

/// Longest slice of an error response body kept in an error message.
const MAX_BODY_SNIPPET: usize = 512;

pub(crate) fn body_snippet(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_owned(),
    }
}

fn transport_is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}

/// Failure to obtain a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("API client id and secret are not configured")]
    MissingCredentials,

    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token response is malformed: {0}")]
    Malformed(String),
}

impl AuthError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => transport_is_transient(e),
            Self::Status { status, .. } => *status >= 500,
            Self::MissingCredentials | Self::Malformed(_) => false,
        }
    }
}

/// Failure of an order search.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("search response is malformed: {0}")]
    Malformed(String),

    /// The API kept reporting more pages past the configured limit.
    #[error("search did not finish within {max_pages} pages")]
    PageLimit { max_pages: u32 },
}

impl QueryError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => transport_is_transient(e),
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) | Self::PageLimit { .. } => false,
        }
    }

    /// The API rejected the token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }
}
