//! # RoomSocket
//!
//! A persistent, self-healing WebSocket connection for room-scoped chat.
//!
//! ## Features
//!
//! - **Single-task I/O**: transport reads, writes, timers and the outbound
//!   queue are owned by one background task
//! - **Offline queueing**: frames sent while (re)connecting are flushed in
//!   order once the connection opens
//! - **Bounded reconnection**: pluggable backoff with a retry budget and a
//!   terminal `FAILED` state
//! - **Typed events**: lifecycle and inbound envelopes through an event bus
//! - **Type-state builder**: the connection config is required at compile time

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core socket functionality
pub use core::{
    builder, client, config, connection_state, events, outbound_queue, timer, transport,
    builder::{states, ChatSocketBuilder},
    client::{ChatSocket, Metrics},
    config::{ConnectionConfig, SocketConfig, DEFAULT_CONNECT_TIMEOUT},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    events::{names, EventBus, ListenerId, SocketEvent},
    outbound_queue::OutboundQueue,
    transport::{TungsteniteConnector, TungsteniteTransport},
};

// Convenience function
pub use core::builder as socket_builder;
