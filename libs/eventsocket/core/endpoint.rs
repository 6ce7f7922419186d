//! Connection target resolution
//!
//! Turns a [`ServerConfig`] plus the logical session descriptor into the URL
//! and headers of one connect attempt.

use crate::error::{EventSocketError, Result};
use crate::traits::{ConnectRequest, Headers, ServerConfig};
use url::Url;

/// Path of the event stream below the server base URL
pub const WEBSOCKET_PATH: &str = "/api/v4/websocket";

/// Resolved target of one connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// ws/wss URL, including resumption query parameters when enabled
    pub url: String,
    /// Value for the Origin header
    pub origin: String,
    /// Whether this attempt uses the resumable protocol
    pub resumable: bool,
}

impl Endpoint {
    /// Resolve the endpoint for the next attempt
    ///
    /// # Arguments
    /// * `config` - Server configuration read for this attempt
    /// * `connection_id` - Last known logical session id (may be empty)
    /// * `sequence` - Next expected server sequence
    pub fn resolve(config: &ServerConfig, connection_id: &str, sequence: u64) -> Result<Self> {
        let connection_url = connection_url(config);
        let origin = origin_of(&connection_url)?;

        let mut url = Url::parse(&connection_url)?;
        if config.reliable_websockets {
            url.query_pairs_mut()
                .append_pair("connection_id", connection_id)
                .append_pair("sequence_number", &sequence.to_string());
        }

        let ws_scheme = match url.scheme() {
            "https" => Some("wss"),
            "http" => Some("ws"),
            _ => None,
        };
        if let Some(scheme) = ws_scheme {
            url.set_scheme(scheme).map_err(|_| {
                EventSocketError::InvalidUrl(format!("cannot switch {} to {}", connection_url, scheme))
            })?;
        }

        Ok(Self {
            url: url.to_string(),
            origin,
            resumable: config.reliable_websockets,
        })
    }

    /// Build the transport request, injecting the Origin header
    pub fn to_request(&self) -> ConnectRequest {
        let mut headers = Headers::new();
        headers.insert("Origin".to_string(), self.origin.clone());
        ConnectRequest {
            url: self.url.clone(),
            headers,
        }
    }
}

/// Base URL (websocket override first) joined with the stream path
pub fn connection_url(config: &ServerConfig) -> String {
    let base = config
        .websocket_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or(&config.server_url);
    format!("{}{}", base.trim().trim_end_matches('/'), WEBSOCKET_PATH)
}

/// Scheme and authority of an http(s)/ws(s) URL
pub fn origin_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| EventSocketError::InvalidUrl(format!("failed to parse origin from {}: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") || parsed.host_str().is_none() {
        return Err(EventSocketError::InvalidUrl(format!(
            "failed to parse origin from {}",
            url
        )));
    }

    Ok(parsed.origin().ascii_serialization())
}
