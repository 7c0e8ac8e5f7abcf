//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// API base used when neither the config file nor the environment provides one.
pub const DEFAULT_API_BASE_URL: &str = "https://chat-api.chatsync.dev";

/// Model identifier sent with every chat request unless overridden.
pub const DEFAULT_MODEL: &str = "default";

/// Root configuration (`config.toml`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub model: String,
    /// Timeout for `POST /chat`
    pub chat_timeout_secs: u64,
    /// Timeout for the OPTIONS preflight
    pub preflight_timeout_secs: u64,
    /// Timeout for `GET /health`
    pub health_timeout_secs: u64,
    /// Retry attempts after which the view stops offering a retry action
    pub max_visible_retries: u32,
    /// Origin announced in the preflight request
    pub origin: Option<String>,
    pub credentials: CredentialsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            chat_timeout_secs: 30,
            preflight_timeout_secs: 5,
            health_timeout_secs: 5,
            max_visible_retries: 3,
            origin: None,
            credentials: CredentialsConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    /// The API base without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

/// Static credentials for non-interactive use.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub user_id: Option<String>,
    pub token: Option<String>,
}
