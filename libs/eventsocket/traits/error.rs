use thiserror::Error;

/// Main error type for eventsocket
#[derive(Error, Debug)]
pub enum EventSocketError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Connection URL could not be resolved or has no usable origin
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No server configuration was available for a connect attempt
    #[error("No server configuration available: {0}")]
    MissingConfiguration(String),

    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound frame could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl From<serde_json::Error> for EventSocketError {
    fn from(err: serde_json::Error) -> Self {
        EventSocketError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for EventSocketError {
    fn from(err: url::ParseError) -> Self {
        EventSocketError::InvalidUrl(err.to_string())
    }
}

/// Result type for eventsocket operations
pub type Result<T> = std::result::Result<T, EventSocketError>;
