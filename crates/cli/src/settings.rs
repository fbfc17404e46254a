//! Process settings, layered with figment:
//! built-in defaults, then the TOML settings file, then `ORDER_REPORTS_*`
//! environment variables (`__` separates nested keys).

use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{ExecutorConfig, RetryPolicies};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use mailer::SmtpConfig;
use orderapi::ApiConfig;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_SETTINGS_FILE: &str = "order-reports.toml";
pub const ENV_PREFIX: &str = "ORDER_REPORTS_";

/// Order API section (`[api]`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_owned(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: 30,
            page_size: 100,
            max_pages: 100,
        }
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    /// Report definitions merged over the built-in defaults.
    pub reports_file: Option<PathBuf>,
    /// Where rendered PDFs are written before delivery.
    pub output_dir: PathBuf,
    /// Used instead of SMTP when no `[smtp]` section is configured.
    pub outbox_dir: PathBuf,
    /// Fallback recipients. A list, or one comma-separated string.
    #[serde(deserialize_with = "comma_list")]
    pub default_recipients: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    pub keep_artifacts: bool,
    pub retry: RetryPolicies,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            reports_file: None,
            output_dir: std::env::temp_dir().join("order-reports"),
            outbox_dir: PathBuf::from("outbox"),
            default_recipients: Vec::new(),
            smtp: None,
            keep_artifacts: false,
            retry: RetryPolicies::default(),
        }
    }
}

fn comma_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    let list = match Raw::deserialize(deserializer)? {
        Raw::One(s) => s.split(',').map(str::to_owned).collect(),
        Raw::Many(v) => v,
    };
    Ok(list
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect())
}

impl Settings {
    /// The layered configuration, before extraction.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings. An explicitly named file must exist; the default one
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(figment::Error::from(format!(
                    "settings file {} does not exist",
                    path.display()
                )))
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_SETTINGS_FILE),
        };
        Self::figment(&file).extract()
    }

    pub fn api_config(&self) -> ApiConfig {
        let mut config = ApiConfig::new(self.api.base_url.clone())
            .with_credentials(self.api.client_id.clone(), self.api.client_secret.clone());
        config.timeout = Duration::from_secs(self.api.timeout_secs.max(1));
        config.page_size = self.api.page_size;
        config.max_pages = self.api.max_pages;
        config
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            output_dir: self.output_dir.clone(),
            default_recipients: self.default_recipients.clone(),
            keep_artifacts: self.keep_artifacts,
            retry: self.retry,
        }
    }
}
