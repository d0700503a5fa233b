//! Session orchestrator
//!
//! A [`ChatSession`] turns a chat target into a live connection: it
//! exchanges the caller's identity for a session token, builds and owns
//! the socket, and routes socket events into the connection status and
//! the room timelines.

use super::error::{ChatError, Result};
use super::status::{ConnectionSnapshot, ConnectionStatus};
use crate::domain::{ChatMessage, ChatTarget, TimelineStore, TimelineUpdate};
use crate::infrastructure::client::chat::protocol;
use crate::infrastructure::client::chat::{classify, Inbound, RoomContext};
use crate::infrastructure::{ChatConfig, SessionGrant, SessionProvider};
use parking_lot::RwLock;
use roomsocket::{
    names, ChatSocket, ConnectionConfig, ConnectionState, Connector, Envelope, ExponentialBackoff, Metrics,
    OutboundFrame, SendError, SocketEvent,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Socket and timeline settings for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Base WebSocket URL used when the session service does not name one
    pub ws_url: String,
    pub connect_timeout: Duration,
    pub handshake_ack: Option<String>,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub max_reconnect_attempts: usize,
    pub timeline_cap: usize,
    pub history_timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            ws_url: config.socket.ws_url.clone(),
            connect_timeout: config.connect_timeout(),
            handshake_ack: config.socket.handshake_ack.clone(),
            reconnect_base_delay: Duration::from_millis(config.reconnect.base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect.max_delay_ms),
            max_reconnect_attempts: config.reconnect.max_attempts,
            timeline_cap: config.timeline.cap,
            history_timeout: config.history_timeout(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

/// One logical chat session for one room
pub struct ChatSession {
    target: ChatTarget,
    options: SessionOptions,
    provider: Arc<dyn SessionProvider>,
    connector: Option<Arc<dyn Connector>>,
    socket: RwLock<Option<Arc<ChatSocket>>>,
    status: Arc<ConnectionStatus>,
    timelines: Arc<TimelineStore>,
    /// Bumped whenever a socket is retired, so its late events are ignored
    generation: Arc<AtomicU64>,
    connect_lock: Mutex<()>,
    destroyed: AtomicBool,
}

impl ChatSession {
    pub fn new(target: ChatTarget, options: SessionOptions, provider: Arc<dyn SessionProvider>) -> Self {
        let timelines = Arc::new(TimelineStore::new(options.timeline_cap));
        Self {
            target,
            options,
            provider,
            connector: None,
            socket: RwLock::new(None),
            status: Arc::new(ConnectionStatus::new()),
            timelines,
            generation: Arc::new(AtomicU64::new(0)),
            connect_lock: Mutex::new(()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Open sockets through `connector` instead of the network
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Acquire a session token and open the connection
    ///
    /// Resolves once connected. A refused token exchange aborts before any
    /// socket is opened. If a connection cycle is already running this
    /// waits for it instead of starting another.
    pub async fn connect(&self) -> Result<()> {
        self.ensure_alive()?;
        let _guard = self.connect_lock.lock().await;
        self.ensure_alive()?;

        if let Some(socket) = self.current_socket() {
            match socket.connection_state() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Authenticating | ConnectionState::Reconnecting => {
                    debug!(room = %self.target.room_id, "Joining running connection cycle");
                    return socket.connect().await.map_err(ChatError::from);
                }
                // Finished sockets are replaced, with a fresh token
                _ => {
                    self.retire_socket();
                }
            }
        }

        info!(room = %self.target.room_id, kind = %self.target.kind, "Requesting chat session");
        let grant = match self.provider.create_session(&self.target).await {
            Ok(grant) => grant,
            Err(e) => {
                error!(room = %self.target.room_id, error = %e, "Session request failed");
                self.status.record_error(e.to_string());
                return Err(ChatError::Authentication(e));
            }
        };
        self.ensure_alive()?;

        let socket = Arc::new(self.build_socket(&grant)?);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.bridge(&socket, generation);
        self.timelines.ensure_room(&self.target.room_id);
        *self.socket.write() = Some(Arc::clone(&socket));

        match socket.connect().await {
            Ok(()) => {
                info!(room = %self.target.room_id, "Chat session connected");
                Ok(())
            }
            Err(e) => {
                error!(room = %self.target.room_id, error = %e, "Chat connection failed");
                self.status.record_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Reconnect with a fresh retry budget
    pub async fn reconnect(&self) -> Result<()> {
        self.ensure_alive()?;
        match self.current_socket() {
            Some(socket) if socket.connection_state() != ConnectionState::Disconnected => {
                socket.force_reconnect().await.map_err(ChatError::from)
            }
            _ => self.connect().await,
        }
    }

    /// Close the connection
    ///
    /// Pending retries and queued frames are dropped. The session can be
    /// connected again with a fresh token.
    pub fn disconnect(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if self.retire_socket() {
            info!(room = %self.target.room_id, "Chat session disconnected");
        }
        self.timelines.release_all_fetches();
        self.status.mark_disconnected();
    }

    /// Disconnect, reset the status and drop all timelines
    ///
    /// Idempotent: only the first call has any effect. Every later
    /// operation fails with [`ChatError::Destroyed`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(room = %self.target.room_id, "Destroying chat session");
        self.disconnect();
        self.status.reset();
        self.timelines.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Send chat text
    ///
    /// Fails immediately unless the connection is `CONNECTED`.
    pub fn send_message(&self, content: impl Into<String>) -> Result<()> {
        let socket = self.connected_socket()?;
        socket.send(OutboundFrame::chat(content)).map_err(|e| {
            warn!(room = %self.target.room_id, error = %e, "Chat message not sent");
            ChatError::from(e)
        })
    }

    /// Ask the server to add this connection to a room
    pub fn join_room(&self, room_id: &str, meta: Value) -> Result<()> {
        let socket = self.connected_socket()?;
        socket.send(OutboundFrame::command(protocol::join_room(room_id, meta)))?;
        self.timelines.ensure_room(room_id);
        debug!(room = %room_id, "Joined room");
        Ok(())
    }

    /// Leave a room and drop its timeline
    pub fn leave_room(&self, room_id: &str) -> Result<()> {
        let socket = self.connected_socket()?;
        socket.send(OutboundFrame::command(protocol::leave_room(room_id)))?;
        self.timelines.clear_room(room_id);
        debug!(room = %room_id, "Left room");
        Ok(())
    }

    /// Request the next page of older messages for a room
    ///
    /// Returns `Ok(false)` without any network traffic when a fetch is
    /// already in flight, the room has no more history, or there is no
    /// cursor yet. Otherwise sends one request and resolves with
    /// `Ok(true)` once the page is merged or the fetch is released.
    pub async fn load_more_messages(&self, room_id: &str) -> Result<bool> {
        let socket = self.connected_socket()?;

        let cursor = match self.timelines.begin_history_fetch(room_id) {
            Ok(cursor) => cursor,
            Err(reason) => {
                debug!(room = %room_id, ?reason, "History fetch skipped");
                return Ok(false);
            }
        };

        if let Err(e) = socket.send(OutboundFrame::command(protocol::load_more(room_id, cursor))) {
            self.timelines.release_history_fetch(room_id);
            warn!(room = %room_id, error = %e, "History request not sent");
            return Err(e.into());
        }
        debug!(room = %room_id, cursor, "History requested");

        let timeout = self.options.history_timeout;
        if self.timelines.wait_fetch_settled(room_id, timeout).await {
            Ok(true)
        } else {
            warn!(room = %room_id, "No history page within {:?}", timeout);
            self.timelines.release_history_fetch(room_id);
            Err(ChatError::HistoryTimeout(timeout))
        }
    }

    pub fn target(&self) -> &ChatTarget {
        &self.target
    }

    pub fn room_id(&self) -> &str {
        &self.target.room_id
    }

    /// Current state, taken from the live socket when there is one
    pub fn connection_state(&self) -> ConnectionState {
        self.current_socket()
            .map(|socket| socket.connection_state())
            .unwrap_or_else(|| self.status.state())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn status(&self) -> ConnectionSnapshot {
        self.status.snapshot()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.status.subscribe()
    }

    pub fn timelines(&self) -> Arc<TimelineStore> {
        Arc::clone(&self.timelines)
    }

    pub fn subscribe_timeline(&self) -> broadcast::Receiver<TimelineUpdate> {
        self.timelines.subscribe()
    }

    pub fn messages(&self, room_id: &str) -> Vec<ChatMessage> {
        self.timelines.messages(room_id)
    }

    pub fn has_more(&self, room_id: &str) -> bool {
        self.timelines.has_more(room_id)
    }

    pub fn is_loading_more(&self, room_id: &str) -> bool {
        self.timelines.is_loading_more(room_id)
    }

    pub fn socket_metrics(&self) -> Option<Metrics> {
        self.current_socket().map(|socket| socket.metrics())
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(ChatError::Destroyed);
        }
        Ok(())
    }

    fn current_socket(&self) -> Option<Arc<ChatSocket>> {
        self.socket.read().clone()
    }

    fn connected_socket(&self) -> Result<Arc<ChatSocket>> {
        self.ensure_alive()?;
        let socket = self.current_socket();
        let state = socket
            .as_ref()
            .map(|socket| socket.connection_state())
            .unwrap_or(ConnectionState::Disconnected);

        match socket {
            Some(socket) if state == ConnectionState::Connected => Ok(socket),
            _ => {
                warn!(room = %self.target.room_id, %state, "Rejected: not connected");
                Err(SendError::NotConnected(state).into())
            }
        }
    }

    /// Disconnect and drop the current socket, if any
    fn retire_socket(&self) -> bool {
        let socket = self.socket.write().take();
        match socket {
            Some(socket) => {
                socket.disconnect();
                true
            }
            None => false,
        }
    }

    fn endpoint(&self, grant: &SessionGrant) -> String {
        let base = grant.websocket_url.as_deref().unwrap_or(&self.options.ws_url);
        // The service may hand out a complete room endpoint
        if base.contains("/ws/") {
            return base.to_string();
        }
        format!("{}/ws/{}", base.trim_end_matches('/'), self.target.kind.endpoint_segment())
    }

    fn build_socket(&self, grant: &SessionGrant) -> Result<ChatSocket> {
        let mut connection = ConnectionConfig::new(self.endpoint(grant), grant.token.clone(), self.target.room_id.clone());
        if let Some(team_id) = &self.target.team_id {
            connection = connection.with_param("teamId", team_id);
        }
        if let Some(match_id) = &self.target.match_id {
            connection = connection.with_param("matchId", match_id);
        }
        connection = connection.with_param("userId", &self.target.user_id);

        let mut builder = roomsocket::builder()
            .config(connection)
            .connect_timeout(self.options.connect_timeout)
            .reconnect_strategy(ExponentialBackoff::new(
                self.options.reconnect_base_delay,
                self.options.reconnect_max_delay,
                Some(self.options.max_reconnect_attempts),
            ));
        if let Some(ack) = &self.options.handshake_ack {
            builder = builder.handshake_ack(ack.clone());
        }
        if let Some(connector) = &self.connector {
            builder = builder.connector(Arc::clone(connector));
        }

        builder.build().map_err(ChatError::from)
    }

    /// Route socket events into the status and the timelines
    fn bridge(&self, socket: &ChatSocket, generation: u64) {
        let lifecycle = [
            names::STATE_CHANGE,
            names::CONNECT,
            names::CONNECT_ERROR,
            names::DISCONNECT,
            names::RECONNECTING,
            names::MAX_RECONNECT_FAILED,
            names::MESSAGE_SEND_ERROR,
        ];

        for name in lifecycle {
            let current = Arc::clone(&self.generation);
            let status = Arc::clone(&self.status);
            let timelines = Arc::clone(&self.timelines);
            socket.on(name, move |event| {
                if current.load(Ordering::Acquire) != generation {
                    return;
                }
                status.apply(event);
                if matches!(event, SocketEvent::Disconnect { .. }) {
                    timelines.release_all_fetches();
                }
            });
        }

        let current = Arc::clone(&self.generation);
        let status = Arc::clone(&self.status);
        let timelines = Arc::clone(&self.timelines);
        let context = RoomContext {
            room_id: self.target.room_id.clone(),
            kind: self.target.kind,
        };
        socket.on(names::MESSAGE, move |event| {
            if current.load(Ordering::Acquire) != generation {
                return;
            }
            if let SocketEvent::Message(envelope) = event {
                route(envelope, &context, &timelines, &status);
            }
        });
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn route(envelope: &Envelope, context: &RoomContext, timelines: &TimelineStore, status: &ConnectionStatus) {
    match classify(envelope, context) {
        Inbound::Chat(message) | Inbound::System(message) => {
            timelines.push_live(message);
        }
        Inbound::History {
            room_id,
            messages,
            has_more,
        } => {
            let received = messages.len();
            let added = timelines.complete_history_fetch(&room_id, messages, has_more);
            debug!(room = %room_id, received, added, has_more, "History page merged");
        }
        Inbound::Presence { room_id, online } => timelines.set_online(&room_id, online),
        Inbound::Error { message, code } => {
            warn!(room = %context.room_id, ?code, "Server error: {}", message);
            status.record_error(message);
        }
        Inbound::Unknown(kind) => {
            debug!(room = %context.room_id, "Ignoring envelope of type '{}'", kind);
        }
    }
}
