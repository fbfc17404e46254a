//! Delivery-stage error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while composing or sending a report email.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid email address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("could not compose message: {0}")]
    Compose(#[from] lettre::error::Error),

    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),

    /// The server answered with a negative SMTP reply.
    #[error("SMTP server rejected the message ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// Connection, TLS or protocol failure before a reply was received.
    #[error("SMTP transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    /// 4xx replies and connection-level failures may succeed on a later
    /// attempt. 5xx replies and bad messages never will.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rejected { code, .. } => (400..500).contains(code),
            Self::Transport(err) => {
                err.is_transient()
                    || err.is_timeout()
                    || !(err.is_permanent() || err.is_client() || err.is_response())
            }
            Self::Io { .. }
            | Self::InvalidAddress { .. }
            | Self::Compose(_)
            | Self::ContentType(_) => false,
        }
    }
}
