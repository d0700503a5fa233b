//! # RoomSocket core
//!
//! The socket handle, its background task and the pieces it is built from.
//!
//! ## Example
//!
//! ```rust,ignore
//! use roomsocket::{ConnectionConfig, OutboundFrame};
//!
//! let socket = roomsocket::builder()
//!     .config(ConnectionConfig::new("wss://chat.example.com/ws/watch-chat", token, "room-1"))
//!     .build()?;
//!
//! let messages = socket.subscribe("message");
//! socket.connect().await?;
//! socket.send(OutboundFrame::chat("hello"))?;
//!
//! while let Ok(event) = messages.recv() {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod events;
pub mod outbound_queue;
pub mod timer;
pub mod transport;

// Re-export main types
pub use builder::{states, ChatSocketBuilder};
pub use client::{ChatSocket, Metrics};
pub use config::{ConnectionConfig, SocketConfig, DEFAULT_CONNECT_TIMEOUT};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use events::{names, EventBus, ListenerId, SocketEvent};
pub use outbound_queue::OutboundQueue;
pub use transport::{TungsteniteConnector, TungsteniteTransport};

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new socket builder
///
/// ```ignore
/// let socket = roomsocket::builder()
///     .config(ConnectionConfig::new(endpoint, token, room_id))
///     .handshake_ack("connected")
///     .build()?;
/// ```
pub fn builder() -> ChatSocketBuilder<builder::states::NoConfig> {
    ChatSocketBuilder::new()
}
