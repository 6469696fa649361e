//! Router configuration.

use std::time::Duration;

/// Origins allowed to call the API with credentials.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://skill-gap-ph.vercel.app",
    "http://localhost:3000",
    "http://localhost:5173",
];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings the router needs at build time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub allowed_origins: Vec<String>,
    /// Shared secret for the refresh endpoint. `None` locks the endpoint.
    pub cron_secret: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            cron_secret: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ApiConfig {
    pub fn with_cron_secret(mut self, secret: Option<String>) -> Self {
        self.cron_secret = secret.filter(|s| !s.is_empty());
        self
    }
}
