//! CLI utilities for binaries
//!
//! Handles configuration path lookup and environment variables
//! for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Stream client configuration (config/stream.yaml)
    Stream,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Stream => "config/stream.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable that overrides the path, if any
    pub fn env_var_name(&self) -> Option<&str> {
        match self {
            ConfigType::Stream => Some("STREAM_CONFIG_PATH"),
            ConfigType::Custom(_) => None,
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use chat_stream_client::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("stream.yaml".to_string()));
/// assert_eq!(path.to_str(), Some("stream.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    config_type
        .env_var_name()
        .and_then(|name| std::env::var(name).ok())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// First positional argument wins over the environment
pub fn resolve_config_path(args: &[String]) -> PathBuf {
    match args.first() {
        Some(path) => load_config_from_env(ConfigType::Custom(path.clone())),
        None => load_config_from_env(ConfigType::Stream),
    }
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
