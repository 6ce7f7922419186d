//! # EventSocket Traits
//!
//! Seams between the session engine and the outside world:
//!
//! - **Transport / TransportConnector**: the physical socket capability
//! - **FrameDecoder**: raw message to structured frame
//! - **ReconnectionStrategy**: delay between connect attempts
//! - **SessionHandler**: consumer callbacks, one method per event category
//! - **ConfigSource**: per-attempt server configuration
//! - **Clock / RetryScheduler**: time, injectable for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventsocket::*;
//!
//! struct Printer;
//!
//! impl SessionHandler for Printer {
//!     fn on_event(&mut self, event: &PushEvent) {
//!         println!("{} #{}", event.event, event.seq);
//!     }
//! }
//! ```

pub mod clock;
pub mod config_source;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod reconnect;
pub mod scheduler;
pub mod transport;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config_source::{ConfigSource, ServerConfig, StaticConfig};
pub use decoder::{FrameDecoder, JsonFrameDecoder, WsMessage};
pub use error::{EventSocketError, Result};
pub use handler::{Callbacks, NoOpHandler, SessionHandler};
pub use reconnect::{NeverReconnect, ReconnectionStrategy, ThresholdBackoff};
pub use scheduler::{RetryScheduler, TimerToken};
pub use transport::{
    ConnectRequest, Headers, LinkId, ReadyState, Transport, TransportConnector, TransportEvent,
    TransportEventSink,
};
