//! Chat Stream Client - Main Library
//!
//! Connects to a chat server's push-event websocket and keeps the stream
//! alive across network failures.
//!
//! ## Architecture
//!
//! - **eventsocket**: session engine (re-exported from workspace)
//! - **config**: YAML + environment configuration for binaries
//! - **logging**: tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use chat_stream_client::bin_common::{load_config_from_env, ConfigType};
//! use chat_stream_client::config::StreamConfig;
//! ```

// Re-export workspace libraries for convenience
pub use eventsocket;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, resolve_config_path, ConfigType};
    pub use runner::{BinaryRunner, RunConfig, ShutdownManager};
}
