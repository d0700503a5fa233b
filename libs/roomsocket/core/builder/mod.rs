pub mod states;

use crate::client::ChatSocket;
use crate::config::{ConnectionConfig, SocketConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::transport::TungsteniteConnector;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`ChatSocket`]
///
/// The connection config is required; `build()` only exists once it is set.
/// Everything else has a default: tungstenite transport, JSON codec,
/// 15 second connect timeout, exponential backoff (1s base, 5 attempts).
pub struct ChatSocketBuilder<C>
where
    C: ConfigState,
{
    _state: TypeState<C>,
    connection: Option<ConnectionConfig>,
    connect_timeout: Duration,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    connector: Option<Arc<dyn Connector>>,
    codec: Option<Arc<dyn FrameCodec>>,
    handshake_ack: Option<String>,
}

impl ChatSocketBuilder<NoConfig> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            connection: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_strategy: None,
            connector: None,
            codec: None,
            handshake_ack: None,
        }
    }

    /// Set the connection parameters (endpoint, token, room)
    pub fn config(self, connection: ConnectionConfig) -> ChatSocketBuilder<HasConfig> {
        ChatSocketBuilder {
            _state: TypeState::new(),
            connection: Some(connection),
            connect_timeout: self.connect_timeout,
            reconnect_strategy: self.reconnect_strategy,
            connector: self.connector,
            codec: self.codec,
            handshake_ack: self.handshake_ack,
        }
    }
}

impl Default for ChatSocketBuilder<NoConfig> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ChatSocketBuilder<C>
where
    C: ConfigState,
{
    /// Time allowed for a connect attempt (including handshake ack, if any)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Replace the transport (tests, proxies)
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn FrameCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Require an inbound envelope of this type before the socket counts as connected
    pub fn handshake_ack(mut self, envelope_type: impl Into<String>) -> Self {
        self.handshake_ack = Some(envelope_type.into());
        self
    }
}

impl ChatSocketBuilder<HasConfig> {
    /// Validate the configuration and spawn the socket task
    ///
    /// Must be called inside a tokio runtime. The socket is returned
    /// `DISCONNECTED`; call [`ChatSocket::connect`] to open it.
    pub fn build(self) -> Result<ChatSocket> {
        let connection = self
            .connection
            .ok_or_else(|| SocketError::Configuration("connection config not set".into()))?;

        if connection.token.is_empty() {
            return Err(SocketError::Configuration("session token is empty".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(SocketError::Configuration("connect timeout must be positive".into()));
        }
        let url = connection.url()?;

        let config = SocketConfig {
            connection,
            url,
            connect_timeout: self.connect_timeout,
            reconnect_strategy: self
                .reconnect_strategy
                .unwrap_or_else(|| Box::new(ExponentialBackoff::default())),
            connector: self.connector.unwrap_or_else(|| Arc::new(TungsteniteConnector)),
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonFrameCodec)),
            handshake_ack: self.handshake_ack,
        };

        Ok(ChatSocket::spawn(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_state::ConnectionState;

    #[tokio::test]
    async fn test_build_starts_disconnected() {
        let socket = ChatSocketBuilder::new()
            .config(ConnectionConfig::new("ws://127.0.0.1:1/ws/watch-chat", "token", "room"))
            .build()
            .unwrap();

        assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
        assert_eq!(socket.metrics().queued_frames, 0);
        socket.shutdown().await;
    }

    #[tokio::test]
    async fn test_build_rejects_bad_config() {
        let result = ChatSocketBuilder::new()
            .config(ConnectionConfig::new("ws://127.0.0.1:1/ws", "", "room"))
            .build();
        assert!(matches!(result, Err(SocketError::Configuration(_))));

        let result = ChatSocketBuilder::new()
            .config(ConnectionConfig::new("http://127.0.0.1:1/ws", "t", "room"))
            .build();
        assert!(matches!(result, Err(SocketError::Configuration(_))));

        let result = ChatSocketBuilder::new()
            .connect_timeout(Duration::ZERO)
            .config(ConnectionConfig::new("ws://127.0.0.1:1/ws", "t", "room"))
            .build();
        assert!(result.is_err());
    }
}
