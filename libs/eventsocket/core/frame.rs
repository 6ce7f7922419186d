//! Wire model for the event stream
//!
//! Inbound frames are either server pushes (`{event, data, broadcast, seq}`)
//! or replies to client requests (`{status, seq_reply, error?}`). Outbound
//! frames are `{action, seq, data}` where `seq` is the per-connection
//! request counter.

use crate::error::{EventSocketError, Result};
use crate::traits::WsMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the first push frame on every stream
pub const HELLO_EVENT: &str = "hello";

/// Action sent right after a physical connection opens
pub const AUTH_CHALLENGE_ACTION: &str = "authentication_challenge";

/// Action for typing indicators
pub const USER_TYPING_ACTION: &str = "user_typing";

/// Server-originated event delivered unsolicited over the connection
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub event: String,
    pub data: Value,
    pub broadcast: Value,
    pub seq: u64,
}

impl PushEvent {
    /// Whether this is the stream-opening hello frame
    pub fn is_hello(&self) -> bool {
        self.event == HELLO_EVENT
    }

    /// Server-assigned logical session id carried by hello frames
    pub fn connection_id(&self) -> Option<&str> {
        self.data.get("connection_id").and_then(Value::as_str)
    }
}

/// Response to a client request, correlated by `seq_reply`
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyFrame {
    pub seq_reply: u64,
    pub status: Option<String>,
    pub error: Option<Value>,
    pub data: Value,
}

impl ReplyFrame {
    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| !e.is_null())
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFrame")]
pub enum InboundFrame {
    Push(PushEvent),
    Reply(ReplyFrame),
}

impl InboundFrame {
    pub fn is_reply(&self) -> bool {
        matches!(self, InboundFrame::Reply(_))
    }

    pub fn as_push(&self) -> Option<&PushEvent> {
        match self {
            InboundFrame::Push(push) => Some(push),
            InboundFrame::Reply(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    broadcast: Value,
    #[serde(default)]
    seq: Option<u64>,
    #[serde(default)]
    seq_reply: Option<u64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl TryFrom<RawFrame> for InboundFrame {
    type Error = EventSocketError;

    fn try_from(raw: RawFrame) -> Result<Self> {
        if let Some(seq_reply) = raw.seq_reply {
            return Ok(InboundFrame::Reply(ReplyFrame {
                seq_reply,
                status: raw.status,
                error: raw.error,
                data: raw.data,
            }));
        }

        let event = raw
            .event
            .ok_or_else(|| EventSocketError::Decode("push frame without event".to_string()))?;
        let seq = raw
            .seq
            .ok_or_else(|| EventSocketError::Decode(format!("push frame '{}' without seq", event)))?;

        Ok(InboundFrame::Push(PushEvent {
            event,
            data: raw.data,
            broadcast: raw.broadcast,
            seq,
        }))
    }
}

/// Client request frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame {
    pub action: String,
    pub seq: u64,
    pub data: Value,
}

impl OutboundFrame {
    pub fn new(action: impl Into<String>, seq: u64, data: Value) -> Self {
        Self {
            action: action.into(),
            seq,
            data,
        }
    }

    /// Serialize into a text message
    pub fn to_message(&self) -> Result<WsMessage> {
        serde_json::to_string(self)
            .map(WsMessage::Text)
            .map_err(|e| EventSocketError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hello_frame_exposes_connection_id() {
        let frame: InboundFrame = serde_json::from_value(json!({
            "event": "hello",
            "data": {"connection_id": "abc", "server_version": "9.0"},
            "broadcast": {},
            "seq": 0
        }))
        .unwrap();

        let push = frame.as_push().unwrap();
        assert!(push.is_hello());
        assert_eq!(push.connection_id(), Some("abc"));
    }

    #[test]
    fn seq_reply_wins_over_push_fields() {
        let frame: InboundFrame = serde_json::from_value(json!({
            "status": "FAIL",
            "seq_reply": 3,
            "error": {"id": "api.web_socket_router.bad_seq.app_error"}
        }))
        .unwrap();

        match frame {
            InboundFrame::Reply(reply) => {
                assert_eq!(reply.seq_reply, 3);
                assert!(reply.is_error());
            }
            other => panic!("expected reply, got {:?}", other),
        }
    }

    #[test]
    fn push_without_seq_is_rejected() {
        let result = serde_json::from_value::<InboundFrame>(json!({"event": "typing"}));
        assert!(result.is_err());
    }

    #[test]
    fn outbound_frame_serializes_action_seq_data() {
        let frame = OutboundFrame::new(AUTH_CHALLENGE_ACTION, 1, json!({"token": "t"}));
        let msg = frame.to_message().unwrap();
        let value: Value = serde_json::from_str(msg.as_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"action": "authentication_challenge", "seq": 1, "data": {"token": "t"}})
        );
    }
}
