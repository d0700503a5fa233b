use super::session::{ChatSession, SessionOptions};
use super::status::ConnectionSnapshot;
use crate::domain::ChatTarget;
use crate::infrastructure::SessionProvider;
use parking_lot::RwLock;
use roomsocket::{ConnectionState, Connector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Key a session is registered under (`"<kind>:<room id>"`)
pub type RoomKey = String;

/// Owner of one [`ChatSession`] per room
///
/// Screens that show the same room share a session instead of opening a
/// second connection. Sessions are created lazily and destroyed
/// explicitly.
///
/// # Example
/// ```ignore
/// let registry = SessionRegistry::new(SessionOptions::from_config(&config), provider);
///
/// let session = registry.get_or_create(ChatTarget::watch("room-1", "user-1"));
/// session.connect().await?;
///
/// // Same room, same session
/// let again = registry.get_or_create(ChatTarget::watch("room-1", "user-1"));
/// assert!(Arc::ptr_eq(&session, &again));
///
/// registry.destroy_all();
/// ```
pub struct SessionRegistry {
    sessions: RwLock<HashMap<RoomKey, Arc<ChatSession>>>,
    options: SessionOptions,
    provider: Arc<dyn SessionProvider>,
    connector: Option<Arc<dyn Connector>>,
}

impl SessionRegistry {
    pub fn new(options: SessionOptions, provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            options,
            provider,
            connector: None,
        }
    }

    /// Open every session's socket through `connector`
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Session for the target's room, created on first use
    ///
    /// A destroyed session is replaced with a fresh one.
    pub fn get_or_create(&self, target: ChatTarget) -> Arc<ChatSession> {
        let key = target.room_key();
        if let Some(session) = self.get(&key) {
            return session;
        }

        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(&key) {
            if !session.is_destroyed() {
                return Arc::clone(session);
            }
        }

        let mut session = ChatSession::new(target, self.options.clone(), Arc::clone(&self.provider));
        if let Some(connector) = &self.connector {
            session = session.with_connector(Arc::clone(connector));
        }
        let session = Arc::new(session);
        sessions.insert(key.clone(), Arc::clone(&session));
        debug!("Registered chat session {}", key);
        session
    }

    /// Live session registered under `key`
    pub fn get(&self, key: &str) -> Option<Arc<ChatSession>> {
        self.sessions
            .read()
            .get(key)
            .filter(|session| !session.is_destroyed())
            .cloned()
    }

    /// Destroy and unregister one session
    pub fn destroy(&self, key: &str) -> bool {
        let removed = self.sessions.write().remove(key);
        match removed {
            Some(session) => {
                session.destroy();
                info!("Destroyed chat session {}", key);
                true
            }
            None => false,
        }
    }

    /// Destroy every session
    pub fn destroy_all(&self) {
        let sessions: Vec<(RoomKey, Arc<ChatSession>)> = self.sessions.write().drain().collect();
        if sessions.is_empty() {
            return;
        }
        info!("Destroying {} chat sessions", sessions.len());
        for (_, session) in sessions {
            session.destroy();
        }
    }

    /// Status of every registered session
    pub fn statuses(&self) -> HashMap<RoomKey, ConnectionSnapshot> {
        self.sessions
            .read()
            .iter()
            .map(|(key, session)| (key.clone(), session.status()))
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|session| session.connection_state() == ConnectionState::Connected)
            .count()
    }

    pub fn keys(&self) -> Vec<RoomKey> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}
