use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw WebSocket data frame
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

    /// Check if message is text
    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Structured frame with an explicit `type` discriminant
///
/// Wire shape: `{"type": "...", "payload": ..., "messageId": "...", "timestamp": 1700000000000}`.
/// Inbound envelopes are transient: they only live while being dispatched to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            message_id: None,
            timestamp: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// What an outbound frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Plain chat text, sent as a raw text frame
    ChatMessage,
    /// Structured intent (join/leave room, history request), sent as a JSON envelope
    Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Text(String),
    Envelope(Envelope),
}

/// A frame accepted by the socket for transmission
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub payload: FramePayload,
    pub generated_at: DateTime<Utc>,
}

impl OutboundFrame {
    /// Plain chat text
    pub fn chat(content: impl Into<String>) -> Self {
        Self {
            payload: FramePayload::Text(content.into()),
            generated_at: Utc::now(),
        }
    }

    /// Structured command envelope
    pub fn command(envelope: Envelope) -> Self {
        Self {
            payload: FramePayload::Envelope(envelope),
            generated_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self.payload {
            FramePayload::Text(_) => FrameKind::ChatMessage,
            FramePayload::Envelope(_) => FrameKind::Command,
        }
    }
}
