//! Delivery into an on-disk outbox directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::{DeliveryError, OutgoingEmail, SendEmail};

pub const DEFAULT_SENDER: &str = "Order Reports <order-reports@localhost>";

/// Writes each message as an RFC 5322 `.eml` file named after the
/// attachment. A later run for the same report and date overwrites it.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    dir: PathBuf,
    from: String,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            from: DEFAULT_SENDER.to_owned(),
        }
    }

    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, email: &OutgoingEmail) -> PathBuf {
        let stem = Path::new(&email.attachment.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_owned());
        self.dir.join(format!("{stem}.eml"))
    }
}

#[async_trait]
impl SendEmail for OutboxMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        let message = email.to_message(&self.from)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| DeliveryError::Io { path, source }
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_err(&self.dir))?;
        let path = self.path_for(email);
        tokio::fs::write(&path, message.formatted())
            .await
            .map_err(io_err(&path))?;

        info!("wrote {} to outbox {}", email.attachment.filename, path.display());
        Ok(path.display().to_string())
    }
}
