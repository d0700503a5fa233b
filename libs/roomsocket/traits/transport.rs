use crate::error::ConnectionError;
use crate::frame::WsMessage;
use async_trait::async_trait;

/// Something observed on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A data frame
    Message(WsMessage),
    /// The remote side sent a close frame
    Closed { code: Option<u16>, reason: String },
}

/// One open physical connection
///
/// Control frames (ping/pong) are handled below this seam and never surface.
#[async_trait]
pub trait Transport: Send {
    /// Write one frame
    async fn send(&mut self, message: WsMessage) -> Result<(), ConnectionError>;

    /// Wait for the next frame or close
    ///
    /// Returns `None` when the stream ended without a close frame.
    /// Must be cancel-safe: it is polled inside `tokio::select!`.
    async fn next_event(&mut self) -> Option<Result<TransportEvent, ConnectionError>>;

    /// Close with the given code
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ConnectionError>;
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url` (token and room parameters already in the query string)
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ConnectionError>;
}
