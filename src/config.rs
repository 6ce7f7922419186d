//! Application configuration
//!
//! Loaded from a YAML file, then overridden from the environment (a `.env`
//! file is honoured). The credential normally comes from `STREAM_TOKEN`
//! rather than the file.

use eventsocket::{ServerConfig, ThresholdBackoff};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Overrides `token`
pub const TOKEN_ENV: &str = "STREAM_TOKEN";

/// Overrides `server_url`
pub const SERVER_URL_ENV: &str = "STREAM_SERVER_URL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Stream client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub server_url: String,

    /// Overrides `server_url` for the websocket connection only
    #[serde(default)]
    pub websocket_url: Option<String>,

    /// Server supports resuming a session after reconnect
    #[serde(default)]
    pub reliable_websockets: bool,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between metrics log lines in long-running binaries
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub min_retry_ms: u64,
    pub max_retry_ms: u64,
    pub failure_threshold: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let backoff = ThresholdBackoff::default();
        Self {
            min_retry_ms: backoff.min_interval().as_millis() as u64,
            max_retry_ms: backoff.max_interval().as_millis() as u64,
            failure_threshold: backoff.threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

impl StreamConfig {
    /// Load configuration from YAML file and environment
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: StreamConfig = serde_yaml::from_str(&yaml_content)?;

        dotenv::dotenv().ok(); // Don't fail if .env doesn't exist

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse from YAML text without consulting the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: StreamConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STREAM_TOKEN` / `STREAM_SERVER_URL` style overrides
    ///
    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
        if let Some(url) = lookup(SERVER_URL_ENV).filter(|v| !v.is_empty()) {
            self.server_url = url;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server_url must not be empty".to_string(),
            ));
        }

        if self.websocket_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "websocket_url must not be empty when set".to_string(),
            ));
        }

        if self.retry.min_retry_ms == 0 {
            return Err(ConfigError::ValidationError(
                "min_retry_ms must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_retry_ms < self.retry.min_retry_ms {
            return Err(ConfigError::ValidationError(
                "max_retry_ms must be >= min_retry_ms".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.log_level
            )));
        }

        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new(self.server_url.clone())
            .with_reliable_websockets(self.reliable_websockets);
        match &self.websocket_url {
            Some(url) => config.with_websocket_url(url.clone()),
            None => config,
        }
    }

    pub fn reconnect_strategy(&self) -> ThresholdBackoff {
        ThresholdBackoff::new(
            Duration::from_millis(self.retry.min_retry_ms),
            Duration::from_millis(self.retry.max_retry_ms),
            self.retry.failure_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StreamConfig {
        StreamConfig::from_yaml("server_url: https://chat.example.com\n").unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = base();
        assert_eq!(config.retry.min_retry_ms, 3_000);
        assert_eq!(config.retry.max_retry_ms, 300_000);
        assert_eq!(config.retry.failure_threshold, 7);
        assert_eq!(config.log_level, "info");
        assert!(!config.reliable_websockets);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = base();
        assert!(config.validate().is_ok());

        config.retry.min_retry_ms = 0;
        assert!(config.validate().is_err());

        config.retry.min_retry_ms = 5_000;
        config.retry.max_retry_ms = 1_000;
        assert!(config.validate().is_err());

        config.retry.max_retry_ms = 5_000;
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_skip_empty_values() {
        let mut config = base();
        config.apply_overrides(|key| match key {
            TOKEN_ENV => Some("secret".to_string()),
            SERVER_URL_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.server_url, "https://chat.example.com");
    }

    #[test]
    fn test_server_config_carries_override_url() {
        let mut config = base();
        config.websocket_url = Some("wss://push.example.com".to_string());
        config.reliable_websockets = true;

        let server = config.server_config();
        assert_eq!(server.server_url, "https://chat.example.com");
        assert_eq!(server.websocket_url.as_deref(), Some("wss://push.example.com"));
        assert!(server.reliable_websockets);
    }
}
