//! The `SendEmail` trait: the seam between the pipeline and a transport.

use async_trait::async_trait;

use crate::{DeliveryError, OutgoingEmail};

#[async_trait]
pub trait SendEmail: Send + Sync {
    /// Deliver `email` with its attachment. Returns a short description of
    /// where it went, for the run log.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError>;
}
