//! Connection settings shared by the auth and query clients.

use std::fmt;
use std::time::Duration;

use reqwest::Client;

/// Order API connection settings.
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Per-request timeout applied to every call.
    pub timeout: Duration,
    pub page_size: u32,
    /// Searches needing more pages than this fail instead of returning a
    /// partial result.
    pub max_pages: u32,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout: Duration::from_secs(30),
            page_size: 100,
            max_pages: 100,
        }
    }

    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// `<base_url>/<path>` without doubled slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// Build the HTTP client used for every order API call.
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("order-reports/", env!("CARGO_PKG_VERSION")))
        .build()
}
