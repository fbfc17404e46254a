//! `mailer` crate: composes report emails and hands them to a transport.
//!
//! [`SmtpMailer`] delivers through an SMTP relay; [`OutboxMailer`] writes
//! the formatted message to a directory instead, for hosts without SMTP.

pub mod error;
pub mod message;
pub mod mock;
pub mod outbox;
pub mod smtp;
pub mod traits;

pub use error::DeliveryError;
pub use message::{recipients_for, render_template, OutgoingEmail, TemplateContext};
pub use outbox::OutboxMailer;
pub use smtp::{SmtpConfig, SmtpMailer, SmtpSecurity};
pub use traits::SendEmail;
