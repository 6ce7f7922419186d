use parking_lot::RwLock;

/// Per-server settings read on every connect attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerConfig {
    /// Base URL of the server (http/https)
    pub server_url: String,
    /// Dedicated websocket base URL; takes precedence over `server_url`
    pub websocket_url: Option<String>,
    /// Server supports resumable connections (connection id + sequence replay)
    pub reliable_websockets: bool,
}

impl ServerConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            websocket_url: None,
            reliable_websockets: false,
        }
    }

    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = Some(url.into());
        self
    }

    pub fn with_reliable_websockets(mut self, enabled: bool) -> Self {
        self.reliable_websockets = enabled;
        self
    }
}

/// Source of server configuration
///
/// Consulted synchronously at the start of every connect attempt, so
/// feature flags picked up from the server apply from the next attempt on.
/// Returning `None` means no configuration is available yet: the attempt is
/// abandoned without scheduling a retry.
pub trait ConfigSource: Send + Sync {
    fn server_config(&self) -> Option<ServerConfig>;
}

/// In-memory configuration that can be swapped at runtime
#[derive(Debug, Default)]
pub struct StaticConfig {
    inner: RwLock<Option<ServerConfig>>,
}

impl StaticConfig {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: RwLock::new(Some(config)),
        }
    }

    /// A source with nothing configured yet
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn replace(&self, config: Option<ServerConfig>) -> Option<ServerConfig> {
        std::mem::replace(&mut *self.inner.write(), config)
    }
}

impl ConfigSource for StaticConfig {
    fn server_config(&self) -> Option<ServerConfig> {
        self.inner.read().clone()
    }
}
