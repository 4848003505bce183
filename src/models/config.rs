//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Cycle cadence and eviction policy
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Content extraction settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Subscription store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Alert delivery
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.store.subscriptions_path.trim().is_empty() {
            return Err(AppError::validation("store.subscriptions_path is empty"));
        }
        for (name, value) in [
            ("notifier.webhook_url", &self.notifier.webhook_url),
            (
                "notifier.operator_webhook_url",
                &self.notifier.operator_webhook_url,
            ),
        ] {
            if let Some(raw) = value {
                url::Url::parse(raw)
                    .map_err(|e| AppError::validation(format!("{name} is invalid: {e}")))?;
            }
        }
        Ok(())
    }
}

/// Cycle cadence and eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Milliseconds between cycles; non-positive values use the default
    #[serde(default = "defaults::interval_ms")]
    pub interval_ms: i64,

    /// Consecutive hard failures tolerated before eviction
    #[serde(default = "defaults::eviction_threshold")]
    pub eviction_threshold: u32,
}

impl WatcherConfig {
    /// Effective cycle interval.
    pub fn interval(&self) -> Duration {
        let ms = if self.interval_ms > 0 {
            self.interval_ms as u64
        } else {
            defaults::interval_ms() as u64
        };
        Duration::from_millis(ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::interval_ms(),
            eviction_threshold: defaults::eviction_threshold(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent fetches per cycle
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Content extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractConfig {
    /// Collapse whitespace runs in selector-extracted text
    #[serde(default)]
    pub normalize_whitespace: bool,
}

/// Subscription store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::subscriptions_path")]
    pub subscriptions_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subscriptions_path: defaults::subscriptions_path(),
        }
    }
}

/// Alert delivery settings. Without a webhook, alerts go to the log.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Falls back to `webhook_url`
    #[serde(default)]
    pub operator_webhook_url: Option<String>,
}

mod defaults {
    pub fn interval_ms() -> i64 {
        15_000
    }
    pub fn eviction_threshold() -> u32 {
        5
    }
    pub fn user_agent() -> String {
        concat!("pagewatch/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        8
    }
    pub fn subscriptions_path() -> String {
        "Subscriptions.json".into()
    }
}
