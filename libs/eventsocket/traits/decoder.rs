use crate::core::frame::InboundFrame;
use crate::error::{EventSocketError, Result};

/// Raw message as delivered by a transport
/// Can be Text or Binary data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Raw bytes of the message regardless of kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WsMessage::Text(s) => s.as_bytes(),
            WsMessage::Binary(b) => b,
        }
    }

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Trait for turning raw transport messages into structured frames
///
/// Decoding runs synchronously on the session task, in arrival order.
/// A decode error drops the single frame; it never touches sequence state
/// or triggers a reconnect.
pub trait FrameDecoder: Send + Sync {
    /// Decode one raw message
    fn decode(&self, message: &WsMessage) -> Result<InboundFrame>;
}

/// JSON decoder for the `{event, data, broadcast, seq}` / `{status, seq_reply}` wire format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFrameDecoder;

impl FrameDecoder for JsonFrameDecoder {
    fn decode(&self, message: &WsMessage) -> Result<InboundFrame> {
        let bytes = message.as_bytes();
        if bytes.is_empty() {
            return Err(EventSocketError::Decode("empty frame".to_string()));
        }
        let frame = serde_json::from_slice::<InboundFrame>(bytes)?;
        Ok(frame)
    }
}
