use crate::traits::*;
use std::sync::Arc;

/// Configuration for a session
///
/// Holds the collaborators a session depends on plus the credential sent on
/// every physical connection. Usually assembled by the type-state builder;
/// constructed directly when driving a [`Session`](crate::session::Session)
/// by hand.
pub struct ClientConfig {
    /// Server configuration, read at the start of every connect attempt
    pub(crate) config_source: Arc<dyn ConfigSource>,

    /// Opens physical connections
    pub(crate) connector: Arc<dyn TransportConnector>,

    /// Raw message to frame
    pub(crate) decoder: Arc<dyn FrameDecoder>,

    /// Delay between connect attempts
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Source of connect/disconnect timestamps
    pub(crate) clock: Arc<dyn Clock>,

    /// Credential sent in the authentication challenge; empty means none
    pub(crate) token: Option<String>,

    /// Last disconnect carried over from a previous session (Unix millis)
    pub(crate) last_disconnect: i64,
}

impl ClientConfig {
    /// Configuration with default decoder, backoff and system clock
    pub fn new(config_source: Arc<dyn ConfigSource>, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            config_source,
            connector,
            decoder: Arc::new(JsonFrameDecoder),
            reconnect_strategy: Box::new(ThresholdBackoff::default()),
            clock: Arc::new(SystemClock),
            token: None,
            last_disconnect: 0,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Box::new(strategy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_last_disconnect(mut self, millis: i64) -> Self {
        self.last_disconnect = millis;
        self
    }

    /// Check if a credential is configured
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn last_disconnect(&self) -> i64 {
        self.last_disconnect
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("has_token", &self.has_token())
            .field("last_disconnect", &self.last_disconnect)
            .finish_non_exhaustive()
    }
}
