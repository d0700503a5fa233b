//! # RoomSocket Traits
//!
//! Core traits and types shared by the socket and its callers:
//!
//! - **Connector / Transport**: open and drive one physical connection
//! - **FrameCodec**: encode outbound frames, decode inbound envelopes
//! - **ReconnectionStrategy**: control backoff and retry budget

pub mod codec;
pub mod error;
pub mod frame;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use codec::{FrameCodec, JsonFrameCodec, PLAIN_TEXT_TYPE};
pub use error::{
    ConnectionError, Result, SendError, SocketError, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
};
pub use frame::{Envelope, FrameKind, FramePayload, OutboundFrame, WsMessage};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{Connector, Transport, TransportEvent};
