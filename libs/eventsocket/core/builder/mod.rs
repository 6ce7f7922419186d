pub mod states;

use crate::client::StreamClient;
use crate::config::ClientConfig;
use crate::traits::*;
use crate::tungstenite::TungsteniteConnector;
use states::*;
use std::sync::Arc;

/// Type-state builder for StreamClient
///
/// This builder uses Rust's type system to enforce that a configuration
/// source is set before the client can be built. Everything else has a
/// default: tokio-tungstenite transport, JSON frames, threshold backoff,
/// system clock, no credential and a no-op handler.
pub struct StreamClientBuilder<S>
where
    S: SourceState,
{
    _state: TypeState<S>,
    config_source: Option<Arc<dyn ConfigSource>>,
    connector: Arc<dyn TransportConnector>,
    decoder: Arc<dyn FrameDecoder>,
    reconnect_strategy: Box<dyn ReconnectionStrategy>,
    clock: Arc<dyn Clock>,
    token: Option<String>,
    last_disconnect: i64,
    handler: Box<dyn SessionHandler>,
}

impl StreamClientBuilder<NoSource> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            config_source: None,
            connector: Arc::new(TungsteniteConnector),
            decoder: Arc::new(JsonFrameDecoder),
            reconnect_strategy: Box::new(ThresholdBackoff::default()),
            clock: Arc::new(SystemClock),
            token: None,
            last_disconnect: 0,
            handler: Box::new(NoOpHandler),
        }
    }

    /// Read server configuration from `source` on every connect attempt
    pub fn config_source(self, source: Arc<dyn ConfigSource>) -> StreamClientBuilder<HasSource> {
        StreamClientBuilder {
            _state: TypeState::new(),
            config_source: Some(source),
            connector: self.connector,
            decoder: self.decoder,
            reconnect_strategy: self.reconnect_strategy,
            clock: self.clock,
            token: self.token,
            last_disconnect: self.last_disconnect,
            handler: self.handler,
        }
    }

    /// Fixed server configuration
    pub fn server(self, config: ServerConfig) -> StreamClientBuilder<HasSource> {
        self.config_source(Arc::new(StaticConfig::new(config)))
    }
}

impl Default for StreamClientBuilder<NoSource> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional settings, available in any state
impl<S> StreamClientBuilder<S>
where
    S: SourceState,
{
    /// Credential for the authentication challenge
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Physical transport implementation
    pub fn connector(mut self, connector: Arc<dyn TransportConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn reconnect_strategy<T>(mut self, strategy: T) -> Self
    where
        T: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Box::new(strategy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Last disconnect time carried over from a previous run (Unix millis)
    pub fn last_disconnect(mut self, millis: i64) -> Self {
        self.last_disconnect = millis;
        self
    }

    /// Consumer callbacks
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: SessionHandler,
    {
        self.handler = Box::new(handler);
        self
    }
}

impl StreamClientBuilder<HasSource> {
    /// Split into the session configuration and handler without spawning
    pub fn into_parts(self) -> (ClientConfig, Box<dyn SessionHandler>) {
        let Self {
            config_source,
            connector,
            decoder,
            reconnect_strategy,
            clock,
            token,
            last_disconnect,
            handler,
            ..
        } = self;

        // HasSource guarantees the source is present
        let config_source = config_source.unwrap_or_else(|| Arc::new(StaticConfig::empty()));

        let config = ClientConfig {
            config_source,
            connector,
            decoder,
            reconnect_strategy,
            clock,
            token,
            last_disconnect,
        };

        (config, handler)
    }

    /// Spawn the session task; the client starts idle
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> StreamClient {
        let (config, handler) = self.into_parts();
        StreamClient::spawn(config, handler)
    }
}
