//! Lock-free connection state and counters
//!
//! The socket task is the only writer; handles and observers read.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Lifecycle state of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Authenticating = 3,
    Reconnecting = 4,
    Failed = 5,
    Closing = 6,
    Closed = 7,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Authenticating,
            4 => ConnectionState::Reconnecting,
            5 => ConnectionState::Failed,
            6 => ConnectionState::Closing,
            7 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Whether frames handed to the socket in this state are accepted
    /// (sent now, or queued until the connection opens)
    pub fn accepts_frames(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected
                | ConnectionState::Connecting
                | ConnectionState::Authenticating
                | ConnectionState::Reconnecting
        )
    }

    /// Whether a connect or reconnect cycle is underway
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Authenticating
                | ConnectionState::Reconnecting
        )
    }

    /// Transitions the socket is allowed to make
    ///
    /// `Closing` and `Disconnected` are reachable from everywhere because
    /// an explicit disconnect may interrupt any phase.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        if self == next {
            return true;
        }

        match next {
            Closing | Disconnected => true,
            Connecting => matches!(self, Disconnected | Reconnecting | Failed | Closed),
            Authenticating => self == Connecting,
            Connected => matches!(self, Connecting | Authenticating),
            Reconnecting => matches!(self, Connecting | Authenticating | Disconnected | Closed),
            Failed => matches!(self, Connecting | Authenticating | Disconnected | Closed | Reconnecting),
            Closed => matches!(self, Connected | Authenticating),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Authenticating => "AUTHENTICATING",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Failed => "FAILED",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

/// Atomic cell holding a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one
    #[inline]
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.inner.swap(state as u8, Ordering::AcqRel))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.get() == ConnectionState::Failed
    }
}

/// Socket counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    reconnect_count: AtomicU64,
    queued_frames: AtomicUsize,
    reconnect_attempt: AtomicUsize,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_queued(&self, queued: usize) {
        self.queued_frames.store(queued, Ordering::Relaxed);
    }

    pub fn set_reconnect_attempt(&self, attempt: usize) {
        self.reconnect_attempt.store(attempt, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub fn queued_frames(&self) -> usize {
        self.queued_frames.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempt(&self) -> usize {
        self.reconnect_attempt.load(Ordering::Relaxed)
    }
}
