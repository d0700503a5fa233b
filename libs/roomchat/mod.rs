//! Room Chat
//!
//! Realtime chat for watch and match rooms: session-token exchange,
//! per-room connection sessions and deduplicated, ordered message
//! timelines with history paging.
//!
//! ## Architecture
//!
//! - **domain**: Messages, chat targets and room timelines
//! - **infrastructure**: Session service client, wire protocol, config, logging
//! - **application**: Chat sessions, connection status and the session registry
//!
//! The connection itself is provided by the `roomsocket` crate.

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used items
pub use application::{
    ChatError, ChatSession, ConnectionSnapshot, ConnectionStatus, SessionOptions, SessionRegistry,
};
pub use domain::{ChatMessage, ChatTarget, MergeDirection, RoomKind, Sender, TimelineStore, TimelineUpdate};
pub use infrastructure::{
    init_tracing, init_tracing_with_level, ChatConfig, ConfigError, HttpSessionClient, SessionApiError,
    SessionGrant, SessionProvider, ShutdownManager,
};
pub use roomsocket::ConnectionState;
