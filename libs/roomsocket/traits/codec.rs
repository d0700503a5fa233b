use crate::error::{Result, SocketError};
use crate::frame::{Envelope, FramePayload, OutboundFrame, WsMessage};
use serde_json::Value;

/// Envelope type given to inbound frames that are not JSON envelopes
pub const PLAIN_TEXT_TYPE: &str = "chat_message";

/// Trait for translating between frames and wire messages
///
/// `decode` is infallible on purpose: anything that is not an envelope
/// degrades to plain chat text so a minimal server cannot break the client.
pub trait FrameCodec: Send + Sync + 'static {
    /// Encode an outbound frame for the wire
    fn encode(&self, frame: &OutboundFrame) -> Result<WsMessage>;

    /// Decode an inbound wire message into an envelope
    fn decode(&self, message: WsMessage) -> Envelope;
}

/// Default codec: raw text for chat, JSON for envelopes
pub struct JsonFrameCodec;

impl FrameCodec for JsonFrameCodec {
    fn encode(&self, frame: &OutboundFrame) -> Result<WsMessage> {
        match &frame.payload {
            FramePayload::Text(text) => Ok(WsMessage::Text(text.clone())),
            FramePayload::Envelope(envelope) => serde_json::to_string(envelope)
                .map(WsMessage::Text)
                .map_err(|e| SocketError::Codec(e.to_string())),
        }
    }

    fn decode(&self, message: WsMessage) -> Envelope {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
        };

        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => envelope,
            Err(_) => Envelope::new(PLAIN_TEXT_TYPE, Value::String(text)),
        }
    }
}
