//! Session engine and its tokio runtime pieces
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventsocket::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = eventsocket::client_builder()
//!         .server(ServerConfig::new("https://chat.example.com").with_reliable_websockets(true))
//!         .token("personal-access-token")
//!         .handler(Callbacks::new().with_event(|event| {
//!             println!("{} #{}", event.event, event.seq);
//!         }))
//!         .build();
//!
//!     client.start()?;
//!
//!     // ...
//!
//!     client.shutdown().await
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod endpoint;
pub mod frame;
pub mod sequence;
pub mod session;
pub mod timer;
pub mod tungstenite;

// Re-export main types
pub use builder::{states, StreamClientBuilder};
pub use client::{ClientCommand, ClientEvent, Metrics, StreamClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
pub use session::{SendOutcome, Session, SessionInput};

/// Create a new stream client builder
///
/// This is a convenience function for starting the builder pattern.
pub fn builder() -> StreamClientBuilder<builder::states::NoSource> {
    StreamClientBuilder::new()
}
