//! Delivery through an SMTP relay.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{DeliveryError, OutgoingEmail, SendEmail};

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587).
    #[default]
    Starttls,
    /// TLS from the first byte (port 465).
    Tls,
    /// No encryption. Only for local relays and tests.
    None,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Relay settings, usually the `[smtp]` table of the settings file.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address, e.g. `Order Reports <reports@example.com>`.
    pub from: String,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("security", &self.security)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// [`SendEmail`] over SMTP using lettre's pooled async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    host: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let mut builder = match config.security {
            SmtpSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };
        if let Some(port) = config.port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        builder = builder.timeout(Some(Duration::from_secs(config.timeout_secs)));

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
            host: config.host.clone(),
        })
    }
}

/// Three-digit reply code of a negative SMTP response, if there was one.
fn reply_code(err: &lettre::transport::smtp::Error) -> Option<u16> {
    err.status().and_then(|code| code.to_string().parse().ok())
}

#[async_trait]
impl SendEmail for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        let message = email.to_message(&self.from)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(
                    "sent {} to {} recipient(s) via {}",
                    email.attachment.filename,
                    email.to.len(),
                    self.host
                );
                Ok(format!("smtp://{}", self.host))
            }
            Err(err) => {
                warn!("SMTP delivery via {} failed: {err}", self.host);
                match reply_code(&err) {
                    Some(code) => Err(DeliveryError::Rejected {
                        code,
                        message: err.to_string(),
                    }),
                    None => Err(DeliveryError::Transport(err)),
                }
            }
        }
    }
}
