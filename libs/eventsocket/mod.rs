//! # EventSocket
//!
//! An auto-reconnecting client for a server push-event websocket stream.
//!
//! ## Features
//!
//! - **Single-owner session**: one tokio task applies commands, transport events and timer fires in order
//! - **Resumable reconnects**: the session resumes from the last seen sequence number when the server supports it
//! - **Gap detection**: out-of-order push frames force a reconnect or notify the consumer
//! - **Type-state builder**: compile-time guarantee that a configuration source is set
//! - **Pluggable seams**: transport, frame decoding, backoff, clock and retry scheduling are traits

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder, client, config, connection_state, endpoint, frame, sequence, session, timer, tungstenite,
    builder::{states, StreamClientBuilder},
    client::{ClientCommand, ClientEvent, Metrics, StreamClient},
    config::ClientConfig,
    connection_state::{AtomicMetrics, AtomicSessionState, SessionState},
    endpoint::Endpoint,
    frame::{InboundFrame, OutboundFrame, PushEvent, ReplyFrame},
    sequence::{SequenceTracker, SequenceVerdict},
    session::{SendOutcome, Session, SessionInput},
    timer::TokioRetryScheduler,
    tungstenite::{TungsteniteConnector, TungsteniteTransport},
};

// Convenience function
pub use core::builder as client_builder;

/// Type alias for Result with EventSocketError
pub type Result<T> = std::result::Result<T, traits::EventSocketError>;
