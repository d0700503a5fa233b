//! Reactive connection status
//!
//! Folds socket lifecycle events into a snapshot that UI code can read or
//! watch: current state, last error, reconnect attempt, last connect time.

use chrono::{DateTime, Utc};
use roomsocket::{ConnectionState, SocketEvent, CLOSE_NORMAL};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub reconnect_attempts: usize,
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
            reconnect_attempts: 0,
            last_connected_at: None,
        }
    }
}

/// Connection state machine observed from socket events
pub struct ConnectionStatus {
    tx: watch::Sender<ConnectionSnapshot>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.tx.borrow().state
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.tx.subscribe()
    }

    /// Fold one socket event into the snapshot
    pub fn apply(&self, event: &SocketEvent) {
        self.tx.send_if_modified(|snapshot| match event {
            SocketEvent::StateChange { to, .. } => {
                let changed = snapshot.state != *to;
                snapshot.state = *to;
                changed
            }
            SocketEvent::Connect => {
                snapshot.state = ConnectionState::Connected;
                snapshot.last_error = None;
                snapshot.reconnect_attempts = 0;
                snapshot.last_connected_at = Some(Utc::now());
                true
            }
            SocketEvent::ConnectError { error, .. } => {
                snapshot.last_error = Some(error.clone());
                true
            }
            SocketEvent::Disconnect { code, reason } => {
                if *code == Some(CLOSE_NORMAL) {
                    return false;
                }
                snapshot.last_error = Some(reason.clone());
                true
            }
            SocketEvent::Reconnecting { attempt, .. } => {
                snapshot.reconnect_attempts = *attempt;
                true
            }
            SocketEvent::MaxReconnectFailed { attempts, reason } => {
                snapshot.reconnect_attempts = *attempts;
                snapshot.last_error = Some(format!("gave up after {} attempts: {}", attempts, reason));
                true
            }
            SocketEvent::MessageSendError { error } => {
                snapshot.last_error = Some(error.clone());
                true
            }
            SocketEvent::Message(_) => false,
        });
    }

    /// Record a failure that happened outside the socket (token exchange)
    pub fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        debug!("Connection status error: {}", error);
        self.tx.send_modify(|snapshot| snapshot.last_error = Some(error));
    }

    /// The socket was let go; no more events will arrive from it
    pub fn mark_disconnected(&self) {
        self.tx.send_if_modified(|snapshot| {
            let changed = snapshot.state != ConnectionState::Disconnected;
            snapshot.state = ConnectionState::Disconnected;
            changed
        });
    }

    /// Back to the initial snapshot
    pub fn reset(&self) {
        self.tx.send_replace(ConnectionSnapshot::default());
    }
}
