//! Typed publish/subscribe for socket events
//!
//! Listeners run synchronously on the socket task, in registration order,
//! so observers see events in exactly the order the socket produced them.

use crate::connection_state::ConnectionState;
use crate::traits::Envelope;
use crossbeam_channel::{unbounded, Receiver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Event names for lifecycle events
pub mod names {
    pub const STATE_CHANGE: &str = "state_change";
    pub const CONNECT: &str = "connect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const DISCONNECT: &str = "disconnect";
    pub const RECONNECTING: &str = "reconnecting";
    pub const MAX_RECONNECT_FAILED: &str = "max_reconnect_failed";
    pub const MESSAGE_SEND_ERROR: &str = "message_send_error";
    /// Generic name every inbound envelope is also published under
    pub const MESSAGE: &str = "message";
}

/// Events emitted by a socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// The lifecycle state changed
    StateChange { from: ConnectionState, to: ConnectionState },
    /// Connection is open (and acknowledged, if a handshake ack is configured)
    Connect,
    /// A connect attempt failed
    ConnectError { error: String, attempt: usize },
    /// An open connection went away
    Disconnect { code: Option<u16>, reason: String },
    /// A retry has been scheduled
    Reconnecting { attempt: usize, max_attempts: Option<usize>, delay: Duration },
    /// Automatic reconnection gave up
    MaxReconnectFailed { attempts: usize, reason: String },
    /// An accepted frame could not be written
    MessageSendError { error: String },
    /// Inbound envelope
    Message(Envelope),
}

impl SocketEvent {
    /// Name the event is published under
    ///
    /// Envelopes use their own `type`; they are additionally
    /// published under [`names::MESSAGE`].
    pub fn name(&self) -> &str {
        match self {
            SocketEvent::StateChange { .. } => names::STATE_CHANGE,
            SocketEvent::Connect => names::CONNECT,
            SocketEvent::ConnectError { .. } => names::CONNECT_ERROR,
            SocketEvent::Disconnect { .. } => names::DISCONNECT,
            SocketEvent::Reconnecting { .. } => names::RECONNECTING,
            SocketEvent::MaxReconnectFailed { .. } => names::MAX_RECONNECT_FAILED,
            SocketEvent::MessageSendError { .. } => names::MESSAGE_SEND_ERROR,
            SocketEvent::Message(envelope) => envelope.kind.as_str(),
        }
    }
}

/// Handle returned by [`EventBus::on`], used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SocketEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for events published under `name`
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(name.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
        }
        listeners.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Receive events published under `name` on a channel
    pub fn subscribe(&self, name: impl Into<String>) -> Receiver<SocketEvent> {
        let (tx, rx) = unbounded();
        self.on(name, move |event| {
            // Receiver dropped: nothing left to notify
            let _ = tx.send(event.clone());
        });
        rx
    }

    /// Deliver `event` to the listeners of its name, and of `message` for envelopes
    pub fn emit(&self, event: &SocketEvent) {
        self.dispatch(event.name(), event);
        if matches!(event, SocketEvent::Message(_)) {
            self.dispatch(names::MESSAGE, event);
        }
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    fn dispatch(&self, name: &str, event: &SocketEvent) {
        // Snapshot so listeners may register or remove listeners
        let targets: Vec<Listener> = match self.listeners.read().get(name) {
            Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };

        for listener in targets {
            listener(event);
        }
    }
}
