//! `RecordingMailer`: a test double for [`SendEmail`].

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::{DeliveryError, OutgoingEmail, SendEmail};

/// Behaviour injected into `RecordingMailer` at construction time.
#[derive(Debug, Clone)]
pub enum MailerBehaviour {
    Accept,
    /// Fail every attempt with the given SMTP reply code.
    Reject(u16),
    /// Fail the first `n` attempts with the code, then accept.
    RejectFirst(usize, u16),
}

/// Records every email it is asked to send.
#[derive(Debug, Clone)]
pub struct RecordingMailer {
    behaviour: MailerBehaviour,
    attempts: Arc<Mutex<usize>>,
    /// Emails accepted, in call order.
    pub sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl RecordingMailer {
    pub fn accepting() -> Self {
        Self::with_behaviour(MailerBehaviour::Accept)
    }

    pub fn rejecting(code: u16) -> Self {
        Self::with_behaviour(MailerBehaviour::Reject(code))
    }

    pub fn with_behaviour(behaviour: MailerBehaviour) -> Self {
        Self {
            behaviour,
            attempts: Arc::new(Mutex::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of `send` calls, successful or not.
    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sent_emails(&self) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SendEmail for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
            *attempts += 1;
            *attempts
        };

        let reject = match self.behaviour {
            MailerBehaviour::Accept => None,
            MailerBehaviour::Reject(code) => Some(code),
            MailerBehaviour::RejectFirst(n, code) => (attempt <= n).then_some(code),
        };
        if let Some(code) = reject {
            return Err(DeliveryError::Rejected {
                code,
                message: "mock rejection".into(),
            });
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email.clone());
        Ok("mock".to_owned())
    }
}
