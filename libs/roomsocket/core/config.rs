use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default time allowed for a connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Immutable per-connection parameters
///
/// Built once per connection attempt series and never mutated in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// WebSocket endpoint, e.g. `wss://chat.example.com/ws/watch-chat`
    pub endpoint: String,
    /// Short-lived session token, sent as the `token` query parameter
    pub token: String,
    pub room_id: String,
    /// Auxiliary query parameters (`teamId`, `matchId`, `userId`)
    pub query: Vec<(String, String)>,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            room_id: room_id.into(),
            query: Vec::new(),
        }
    }

    /// Add an auxiliary query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Full connect URL with token and room parameters
    pub fn url(&self) -> Result<String> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| SocketError::Configuration(format!("invalid endpoint '{}': {}", self.endpoint, e)))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(SocketError::Configuration(format!(
                    "endpoint scheme must be ws or wss, got '{}'",
                    other
                )))
            }
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("token", &self.token);
            pairs.append_pair("roomId", &self.room_id);
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// Endpoint without credentials, safe to log
    pub fn redacted(&self) -> &str {
        self.endpoint.split('?').next().unwrap_or(&self.endpoint)
    }
}

/// Socket configuration assembled by the builder
pub struct SocketConfig {
    pub connection: ConnectionConfig,
    /// Precomputed connect URL
    pub(crate) url: String,
    pub connect_timeout: Duration,
    pub reconnect_strategy: Box<dyn ReconnectionStrategy>,
    pub connector: Arc<dyn Connector>,
    pub codec: Arc<dyn FrameCodec>,
    /// Envelope type that confirms authentication; `None` means open == authenticated
    pub handshake_ack: Option<String>,
}

impl SocketConfig {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for SocketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConfig")
            .field("endpoint", &self.connection.redacted())
            .field("room_id", &self.connection.room_id)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_attempts", &self.reconnect_strategy.max_attempts())
            .field("handshake_ack", &self.handshake_ack)
            .finish()
    }
}
