use crate::core::session::SessionInput;
use crate::error::Result;
use crate::traits::WsMessage;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// HTTP headers to send with the WebSocket upgrade request
pub type Headers = HashMap<String, String>;

/// Identifier of one physical connection within a session
///
/// Every `open` gets a fresh id. Events carrying an id other than the
/// session's current link are stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Ready state of a physical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for ReadyState {
    fn from(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Event emitted by a transport for its physical connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Upgrade completed, frames may flow
    Opened,
    /// Inbound data frame
    Message(WsMessage),
    /// Socket level error; a `Closed` event follows when the socket is gone
    Error(String),
    /// Physical connection is gone (after open failure, remote close or local close)
    Closed,
}

/// What the session asks a connector to open
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub url: String,
    pub headers: Headers,
}

/// Channel through which a transport reports events back to its session
///
/// Every event goes through the session inbox, so open, message, error and
/// close callbacks are serialized with each other and with client commands.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    link: LinkId,
    tx: UnboundedSender<SessionInput>,
}

impl TransportEventSink {
    pub fn new(link: LinkId, tx: UnboundedSender<SessionInput>) -> Self {
        Self { link, tx }
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Deliver an event; returns false once the session is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionInput::Transport {
                link: self.link,
                event,
            })
            .is_ok()
    }
}

/// Handle to one physical connection, exclusively owned by the session
pub trait Transport: Send {
    /// Queue a frame for sending; only meaningful while `Open`
    fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Start a graceful close; a `Closed` event follows
    fn close(&mut self);

    /// Dispose the connection without emitting any further events
    fn invalidate(&mut self);

    fn ready_state(&self) -> ReadyState;
}

/// Capability to open physical connections
///
/// `open` must not block: it returns a handle in `Connecting` state and
/// reports the outcome through `sink`. A failed open is reported as
/// `Error` followed by `Closed`.
pub trait TransportConnector: Send + Sync {
    fn open(&self, request: ConnectRequest, sink: TransportEventSink) -> Box<dyn Transport>;
}
