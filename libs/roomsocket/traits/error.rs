use crate::core::connection_state::ConnectionState;
use std::time::Duration;
use thiserror::Error;

/// WebSocket close code for a normal, client-initiated closure
pub const CLOSE_NORMAL: u16 = 1000;

/// WebSocket close code servers use to reject a session (bad or expired token)
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Transport-level failure: opening, keeping or closing the physical connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport reported an error (DNS, TCP, TLS, handshake, I/O)
    #[error("transport error: {0}")]
    Transport(String),

    /// The connect attempt (or its handshake acknowledgment) did not finish in time
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The remote side closed the connection
    #[error("connection closed by remote (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    /// The connection was closed by this client
    #[error("connection closed by client")]
    ClientClosed,
}

impl ConnectionError {
    /// Whether an automatic reconnect cycle should retry after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectionError::Transport(_) | ConnectionError::Timeout(_) => true,
            ConnectionError::Closed { code, .. } => *code != Some(CLOSE_POLICY_VIOLATION),
            ConnectionError::ClientClosed => false,
        }
    }

    /// Close code carried by the error, if any
    pub fn close_code(&self) -> Option<u16> {
        match self {
            ConnectionError::Closed { code, .. } => *code,
            ConnectionError::ClientClosed => Some(CLOSE_NORMAL),
            _ => None,
        }
    }
}

/// Failure to hand a frame to the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Send was requested while no connection exists or is being established
    #[error("not connected (state: {0:?})")]
    NotConnected(ConnectionState),

    /// The transport rejected the write
    #[error("transport rejected write: {0}")]
    Transport(String),
}

/// Main error type for roomsocket
#[derive(Error, Debug, Clone)]
pub enum SocketError {
    /// Connection could not be opened or was lost
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A frame could not be sent
    #[error("Send error: {0}")]
    Send(#[from] SendError),

    /// Automatic reconnection spent its retry budget
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectExhausted { attempts: usize, reason: String },

    /// Frame encoding error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Channel receive error
    #[error("Channel receive error: {0}")]
    ChannelReceive(String),
}

/// Result type for roomsocket operations
pub type Result<T> = std::result::Result<T, SocketError>;
