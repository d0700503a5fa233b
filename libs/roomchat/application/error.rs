use crate::infrastructure::{ConfigError, SessionApiError};
use roomsocket::{ConnectionError, SendError, SocketError};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by chat sessions
#[derive(Error, Debug)]
pub enum ChatError {
    /// The session-token exchange failed or was refused
    #[error("Authentication failed: {0}")]
    Authentication(#[from] SessionApiError),

    /// The connection could not be opened or was lost
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A frame was not accepted
    #[error("Send error: {0}")]
    Send(#[from] SendError),

    /// Automatic reconnection spent its retry budget
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectExhausted { attempts: usize, reason: String },

    /// No history page arrived in time
    #[error("History request timed out after {0:?}")]
    HistoryTimeout(Duration),

    /// Any other socket failure
    #[error("Socket error: {0}")]
    Socket(SocketError),

    /// The session was destroyed; create a new one
    #[error("Chat session has been destroyed")]
    Destroyed,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SocketError> for ChatError {
    fn from(error: SocketError) -> Self {
        match error {
            SocketError::Connection(e) => ChatError::Connection(e),
            SocketError::Send(e) => ChatError::Send(e),
            SocketError::ReconnectExhausted { attempts, reason } => ChatError::ReconnectExhausted { attempts, reason },
            other => ChatError::Socket(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
