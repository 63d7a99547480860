//! CLI configuration
//!
//! Stored as TOML under the user's config directory. A default file is
//! written on first run so the server address and session can be filled in.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use social_messages::{ApiConfig, CsrfToken, PollerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub polling: PollingConfig,
}

/// Where the server lives and how to authenticate against it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server root, e.g. `https://social.example.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Raw `Cookie` header copied from an authenticated browser session
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// CSRF token; derived from the `csrftoken` cookie when absent
    #[serde(default)]
    pub csrf_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Refresh timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_message_interval")]
    pub message_interval_secs: u64,

    #[serde(default = "default_presence_interval")]
    pub presence_interval_secs: u64,

    /// Rows from the bottom that still count as following the chat
    #[serde(default = "default_scroll_threshold")]
    pub scroll_threshold: u32,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_message_interval() -> u64 {
    3
}

fn default_presence_interval() -> u64 {
    10
}

fn default_scroll_threshold() -> u32 {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: None,
            csrf_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            message_interval_secs: default_message_interval(),
            presence_interval_secs: default_presence_interval(),
            scroll_threshold: default_scroll_threshold(),
        }
    }
}

impl Config {
    /// Default location: `<config dir>/social-messages/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("social-messages")
            .join(CONFIG_FILE_NAME)
    }

    /// Load configuration from `path`, creating a default file if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Connection settings for the HTTP client
    pub fn api_config(&self) -> ApiConfig {
        let mut api = ApiConfig::new(&self.server.base_url)
            .with_timeout(Duration::from_secs(self.server.request_timeout_secs));

        // Explicit token first so the cookie does not override it
        if let Some(token) = self.server.csrf_token.as_deref().filter(|t| !t.is_empty()) {
            api = api.with_csrf_token(CsrfToken::new(token));
        }
        if let Some(cookie) = self.server.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            api = api.with_session_cookie(cookie);
        }
        api
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            message_interval: Duration::from_secs(self.polling.message_interval_secs.max(1)),
            presence_interval: Duration::from_secs(self.polling.presence_interval_secs.max(1)),
            scroll_threshold: self.polling.scroll_threshold,
        }
    }
}
