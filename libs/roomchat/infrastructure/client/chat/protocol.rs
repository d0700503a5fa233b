//! Chat wire protocol
//!
//! Inbound envelopes are classified into [`Inbound`]; outbound intents are
//! built as envelopes with a client-generated message id.

use crate::domain::{ChatMessage, RoomKind, Sender};
use chrono::Utc;
use roomsocket::Envelope;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Envelope types understood by the client
pub mod types {
    pub const CHAT_MESSAGE: &str = roomsocket::PLAIN_TEXT_TYPE;
    pub const HISTORY: &str = "history";
    pub const PRESENCE: &str = "presence";
    pub const ERROR: &str = "error";
    pub const SYSTEM: &str = "system";
    pub const JOIN_ROOM: &str = "join_room";
    pub const LEAVE_ROOM: &str = "leave_room";
    pub const LOAD_MORE: &str = "load_more";
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Chat(ChatMessage),
    History {
        room_id: String,
        messages: Vec<ChatMessage>,
        has_more: bool,
    },
    Presence {
        room_id: String,
        online: u64,
    },
    Error {
        message: String,
        code: Option<String>,
    },
    System(ChatMessage),
    Unknown(String),
}

/// Room a frame is interpreted against when it does not name one
#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room_id: String,
    pub kind: RoomKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireKind {
    System,
    Anonymous,
    Attributed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChatMessage {
    #[serde(default)]
    room_id: Option<String>,
    #[serde(alias = "message")]
    content: String,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default, alias = "id")]
    message_id: Option<String>,
    #[serde(default)]
    kind: Option<WireKind>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, alias = "username")]
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHistory {
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default)]
    messages: Vec<WireChatMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePresence {
    #[serde(default)]
    room_id: Option<String>,
    #[serde(alias = "online")]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(alias = "error")]
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl WireChatMessage {
    /// `envelope` supplies a fallback id and timestamp for single messages;
    /// history entries pass `None` so they never share the page's id.
    fn into_message(self, envelope: Option<&Envelope>, context: &RoomContext, forced: Option<Sender>) -> ChatMessage {
        let sender = forced.unwrap_or_else(|| match self.kind {
            Some(WireKind::System) => Sender::System,
            Some(WireKind::Anonymous) => Sender::Anonymous {
                nickname: self.nickname.clone(),
            },
            Some(WireKind::Attributed) => attributed_or_anonymous(self.user_id.clone(), self.nickname.clone()),
            // Kind-less payloads: watch rooms are anonymous by nature
            None => match context.kind {
                RoomKind::Watch => Sender::Anonymous {
                    nickname: self.nickname.clone(),
                },
                RoomKind::Match => attributed_or_anonymous(self.user_id.clone(), self.nickname.clone()),
            },
        });

        ChatMessage {
            room_id: self.room_id.unwrap_or_else(|| context.room_id.clone()),
            content: self.content,
            timestamp: self
                .timestamp
                .or_else(|| envelope.and_then(|envelope| envelope.timestamp))
                .unwrap_or_else(now_millis),
            message_id: self
                .message_id
                .or_else(|| envelope.and_then(|envelope| envelope.message_id.clone())),
            sender,
        }
    }
}

fn attributed_or_anonymous(user_id: Option<String>, nickname: Option<String>) -> Sender {
    match user_id {
        Some(user_id) => Sender::Attributed { user_id, nickname },
        None => Sender::Anonymous { nickname },
    }
}

fn chat_from_payload(envelope: &Envelope, context: &RoomContext, forced: Option<Sender>) -> Option<ChatMessage> {
    match &envelope.payload {
        // Bare text frame
        Value::String(text) => Some(ChatMessage {
            room_id: context.room_id.clone(),
            content: text.clone(),
            timestamp: envelope.timestamp.unwrap_or_else(now_millis),
            message_id: envelope.message_id.clone(),
            sender: forced.unwrap_or(Sender::Anonymous { nickname: None }),
        }),
        payload => serde_json::from_value::<WireChatMessage>(payload.clone())
            .ok()
            .map(|wire| wire.into_message(Some(envelope), context, forced)),
    }
}

/// Classify an inbound envelope
///
/// Malformed payloads of known types become [`Inbound::Unknown`]
/// carrying the envelope type.
pub fn classify(envelope: &Envelope, context: &RoomContext) -> Inbound {
    let unknown = || Inbound::Unknown(envelope.kind.clone());

    match envelope.kind.as_str() {
        types::CHAT_MESSAGE => chat_from_payload(envelope, context, None)
            .map(|message| match message.sender {
                Sender::System => Inbound::System(message),
                _ => Inbound::Chat(message),
            })
            .unwrap_or_else(unknown),
        types::SYSTEM => chat_from_payload(envelope, context, Some(Sender::System))
            .map(Inbound::System)
            .unwrap_or_else(unknown),
        types::HISTORY => match serde_json::from_value::<WireHistory>(envelope.payload.clone()) {
            Ok(page) => {
                let room_id = page.room_id.unwrap_or_else(|| context.room_id.clone());
                let page_context = RoomContext {
                    room_id: room_id.clone(),
                    kind: context.kind,
                };
                let messages = page
                    .messages
                    .into_iter()
                    .map(|wire| wire.into_message(None, &page_context, None))
                    .collect();
                Inbound::History {
                    room_id,
                    messages,
                    has_more: page.has_more,
                }
            }
            Err(_) => unknown(),
        },
        types::PRESENCE => match serde_json::from_value::<WirePresence>(envelope.payload.clone()) {
            Ok(presence) => Inbound::Presence {
                room_id: presence.room_id.unwrap_or_else(|| context.room_id.clone()),
                online: presence.count,
            },
            Err(_) => unknown(),
        },
        types::ERROR => match &envelope.payload {
            Value::String(message) => Inbound::Error {
                message: message.clone(),
                code: None,
            },
            payload => match serde_json::from_value::<WireError>(payload.clone()) {
                Ok(error) => Inbound::Error {
                    message: error.message,
                    code: error.code.map(|code| match code {
                        Value::String(code) => code,
                        other => other.to_string(),
                    }),
                },
                Err(_) => unknown(),
            },
        },
        _ => unknown(),
    }
}

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Client-generated id for outbound envelopes
pub fn next_message_id() -> String {
    format!("c{}-{}", now_millis(), NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
}

fn command(kind: &str, payload: Value) -> Envelope {
    Envelope::new(kind, payload)
        .with_message_id(next_message_id())
        .with_timestamp(now_millis())
}

/// Ask the server to add this connection to a room
pub fn join_room(room_id: &str, meta: Value) -> Envelope {
    let payload = match meta {
        Value::Null => json!({ "roomId": room_id }),
        meta => json!({ "roomId": room_id, "meta": meta }),
    };
    command(types::JOIN_ROOM, payload)
}

pub fn leave_room(room_id: &str) -> Envelope {
    command(types::LEAVE_ROOM, json!({ "roomId": room_id }))
}

/// Request the history page adjacent to `cursor`
pub fn load_more(room_id: &str, cursor: i64) -> Envelope {
    command(types::LOAD_MORE, json!({ "roomId": room_id, "timestamp": cursor }))
}
