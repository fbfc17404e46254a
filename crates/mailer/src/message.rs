//! Message composition: template substitution, recipient resolution and the
//! MIME structure shared by every transport.

use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use reports::{ConfigError, ReportArtifact, ReportConfig};

use crate::DeliveryError;

/// Values available to subject and body templates.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub date: NaiveDate,
    pub report_name: String,
    pub record_count: usize,
}

/// Replace `{date}`, `{report_name}` and `{record_count}` in `template`.
/// Unknown placeholders are left as they are.
pub fn render_template(template: &str, ctx: &TemplateContext) -> String {
    template
        .replace("{date}", &ctx.date.format("%Y-%m-%d").to_string())
        .replace("{report_name}", &ctx.report_name)
        .replace("{record_count}", &ctx.record_count.to_string())
}

/// Recipients for `config`: its own list, else `defaults`.
///
/// # Errors
/// [`ConfigError::NoRecipients`] when both are empty, and
/// [`ConfigError::InvalidRecipient`] for a default without an `@`.
pub fn recipients_for(config: &ReportConfig, defaults: &[String]) -> Result<Vec<String>, ConfigError> {
    if !config.email.recipients.is_empty() {
        return Ok(config.email.recipients.clone());
    }
    let defaults: Vec<String> = defaults
        .iter()
        .map(|a| a.trim().to_owned())
        .filter(|a| !a.is_empty())
        .collect();
    if let Some(bad) = defaults.iter().find(|a| !a.contains('@')) {
        return Err(ConfigError::InvalidRecipient {
            report_id: config.report_id.clone(),
            address: bad.clone(),
        });
    }
    if defaults.is_empty() {
        return Err(ConfigError::NoRecipients {
            report_id: config.report_id.clone(),
        });
    }
    Ok(defaults)
}

/// A fully resolved report email.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: ReportArtifact,
}

impl OutgoingEmail {
    /// Fill the report's subject and body templates.
    pub fn compose(
        config: &ReportConfig,
        to: Vec<String>,
        ctx: &TemplateContext,
        attachment: ReportArtifact,
    ) -> Self {
        Self {
            to,
            subject: render_template(&config.email.subject, ctx),
            body: render_template(&config.email.body, ctx),
            attachment,
        }
    }

    /// Build the MIME message: a plain-text part followed by the PDF.
    pub fn to_message(&self, from: &str) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(from)?)
            .subject(self.subject.clone());
        for address in &self.to {
            builder = builder.to(parse_mailbox(address)?);
        }

        let pdf = ContentType::parse("application/pdf")?;
        let attachment =
            Attachment::new(self.attachment.filename.clone()).body(self.attachment.bytes.clone(), pdf);

        Ok(builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(self.body.clone()))
                .singlepart(attachment),
        )?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|source| DeliveryError::InvalidAddress {
            address: address.to_owned(),
            source,
        })
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn config(recipients: &[&str]) -> ReportConfig {
        serde_json::from_value(serde_json::json!({
            "report_id": "daily_order_summary",
            "name": "Daily Order Summary",
            "schedule": "0 6 * * *",
            "email": {
                "recipients": recipients,
                "subject": "{report_name} for {date}",
                "body": "{record_count} orders on {date}. {unknown} stays."
            },
            "report_fields": ["OrderId"]
        }))
        .unwrap()
    }

    fn ctx() -> TemplateContext {
        TemplateContext {
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            report_name: "Daily Order Summary".into(),
            record_count: 42,
        }
    }

    fn artifact() -> ReportArtifact {
        ReportArtifact {
            filename: "daily_order_summary_20261016.pdf".into(),
            bytes: b"%PDF-1.5 test".to_vec(),
        }
    }

    #[test]
    fn templates_substitute_known_placeholders() {
        let email = OutgoingEmail::compose(&config(&["a@example.com"]), vec![], &ctx(), artifact());
        assert_eq!(email.subject, "Daily Order Summary for 2026-10-16");
        assert_eq!(email.body, "42 orders on 2026-10-16. {unknown} stays.");
    }

    #[test]
    fn config_recipients_win_over_defaults() {
        let defaults = vec!["ops@example.com".to_owned()];
        let to = recipients_for(&config(&["a@example.com"]), &defaults).unwrap();
        assert_eq!(to, ["a@example.com"]);
        let to = recipients_for(&config(&[]), &defaults).unwrap();
        assert_eq!(to, ["ops@example.com"]);
    }

    #[test]
    fn no_recipients_anywhere_is_a_config_error() {
        let err = recipients_for(&config(&[]), &[" ".to_owned()]).unwrap_err();
        assert!(matches!(err, ConfigError::NoRecipients { .. }));
        let err = recipients_for(&config(&[]), &["nobody".to_owned()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecipient { .. }));
    }

    #[test]
    fn message_carries_the_pdf_attachment() {
        let email = OutgoingEmail::compose(
            &config(&["a@example.com"]),
            vec!["a@example.com".into(), "b@example.com".into()],
            &ctx(),
            artifact(),
        );
        let raw = String::from_utf8(email.to_message("reports@example.com").unwrap().formatted())
            .unwrap();
        assert!(raw.contains("Subject: Daily Order Summary for 2026-10-16"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("daily_order_summary_20261016.pdf"));
        assert!(raw.contains("b@example.com"));
    }

    #[test]
    fn bad_sender_is_rejected() {
        let email = OutgoingEmail::compose(&config(&[]), vec!["a@example.com".into()], &ctx(), artifact());
        assert!(matches!(
            email.to_message("not an address"),
            Err(DeliveryError::InvalidAddress { .. })
        ));
    }
}
