//! Per-room message timelines
//!
//! [`RoomTimeline`] holds the merge algorithm; [`TimelineStore`] owns every
//! room's timeline plus its pagination and presence state.

use super::models::{ChatMessage, MergeDirection};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};

/// Maximum number of messages kept per room
pub const DEFAULT_TIMELINE_CAP: usize = 200;

/// Ordered messages of one room plus its pagination state
#[derive(Debug, Clone)]
pub struct RoomTimeline {
    messages: Vec<ChatMessage>,
    has_more: bool,
    last_known_timestamp: Option<i64>,
    loading_more: bool,
    online: Option<u64>,
}

impl Default for RoomTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomTimeline {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            has_more: true,
            last_known_timestamp: None,
            loading_more: false,
            online: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor for the next history request
    pub fn last_known_timestamp(&self) -> Option<i64> {
        self.last_known_timestamp
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Latest online count pushed by the server
    pub fn online(&self) -> Option<u64> {
        self.online
    }

    /// Merge a batch into the timeline, returning how many messages were added
    ///
    /// Messages whose id is already present (or repeated in the batch) are
    /// dropped. The result is ordered by timestamp; ties keep their merge
    /// position. Over the cap, a prepend drops the newest entries and an
    /// append drops the oldest. Fresh messages evicted by the cap in the
    /// same merge are not counted.
    pub fn merge(&mut self, batch: Vec<ChatMessage>, direction: MergeDirection, cap: usize) -> usize {
        let mut seen: HashSet<String> = self
            .messages
            .iter()
            .filter_map(|message| message.identity().map(str::to_string))
            .collect();

        let mut fresh: Vec<(bool, ChatMessage)> = batch
            .into_iter()
            .filter(|message| match message.identity() {
                Some(id) => seen.insert(id.to_string()),
                None => true,
            })
            .map(|message| (true, message))
            .collect();

        if fresh.is_empty() {
            return 0;
        }
        fresh.sort_by_key(|(_, message)| message.timestamp);
        let batch_max = fresh.last().map(|(_, message)| message.timestamp);

        let existing = std::mem::take(&mut self.messages).into_iter().map(|message| (false, message));
        let mut merged: Vec<(bool, ChatMessage)> = match direction {
            MergeDirection::Append => existing.chain(fresh).collect(),
            MergeDirection::Prepend => fresh.into_iter().chain(existing).collect(),
        };

        // A late history page still lands in its chronological slot
        merged.sort_by_key(|(_, message)| message.timestamp);

        if merged.len() > cap {
            let excess = merged.len() - cap;
            match direction {
                MergeDirection::Prepend => merged.truncate(cap),
                MergeDirection::Append => {
                    merged.drain(..excess);
                }
            }
        }

        let added = merged.iter().filter(|(is_fresh, _)| *is_fresh).count();
        self.messages = merged.into_iter().map(|(_, message)| message).collect();

        self.last_known_timestamp = match (self.last_known_timestamp, batch_max) {
            (Some(current), Some(candidate)) => Some(current.max(candidate)),
            (current, candidate) => current.or(candidate),
        };

        added
    }
}

/// Why a history fetch was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRejected {
    /// A fetch for this room is already outstanding
    InFlight,
    /// The service reported no older messages
    Exhausted,
    /// Nothing to page from yet
    NoCursor,
}

/// Change notification published by the store
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineUpdate {
    Live(ChatMessage),
    History { room_id: String, added: usize, has_more: bool },
    Presence { room_id: String, online: u64 },
    Cleared { room_id: String },
}

/// Owns every room's timeline
///
/// All mutation goes through the store, serialized per store by a single
/// lock, so the ordering, dedup and cap invariants hold per room.
pub struct TimelineStore {
    rooms: RwLock<HashMap<String, RoomTimeline>>,
    cap: usize,
    fetch_settled: Notify,
    updates: broadcast::Sender<TimelineUpdate>,
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_CAP)
    }
}

impl TimelineStore {
    pub fn new(cap: usize) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            rooms: RwLock::new(HashMap::new()),
            cap,
            fetch_settled: Notify::new(),
            updates,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Receive timeline change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineUpdate> {
        self.updates.subscribe()
    }

    fn publish(&self, update: TimelineUpdate) {
        // No receivers is fine
        let _ = self.updates.send(update);
    }

    /// Create the room's timeline if it does not exist yet
    pub fn ensure_room(&self, room_id: &str) {
        self.rooms.write().entry(room_id.to_string()).or_default();
    }

    /// Merge a batch into a room, creating the room on first use
    pub fn merge(&self, room_id: &str, batch: Vec<ChatMessage>, direction: MergeDirection) -> usize {
        let added = {
            let mut rooms = self.rooms.write();
            let timeline = rooms.entry(room_id.to_string()).or_default();
            timeline.merge(batch, direction, self.cap)
        };
        if added > 0 {
            debug!(room = %room_id, added, ?direction, "Merged messages");
        }
        added
    }

    /// Merge one live message, publishing it if it was new
    pub fn push_live(&self, message: ChatMessage) -> bool {
        let room_id = message.room_id.clone();
        let added = self.merge(&room_id, vec![message.clone()], MergeDirection::Append);
        if added > 0 {
            self.publish(TimelineUpdate::Live(message));
        }
        added > 0
    }

    pub fn messages(&self, room_id: &str) -> Vec<ChatMessage> {
        self.rooms
            .read()
            .get(room_id)
            .map(|timeline| timeline.messages.clone())
            .unwrap_or_default()
    }

    /// Read a room's timeline without cloning it
    pub fn with_room<R>(&self, room_id: &str, f: impl FnOnce(&RoomTimeline) -> R) -> Option<R> {
        self.rooms.read().get(room_id).map(f)
    }

    pub fn has_more(&self, room_id: &str) -> bool {
        self.with_room(room_id, RoomTimeline::has_more).unwrap_or(true)
    }

    pub fn is_loading_more(&self, room_id: &str) -> bool {
        self.with_room(room_id, RoomTimeline::is_loading_more).unwrap_or(false)
    }

    pub fn last_known_timestamp(&self, room_id: &str) -> Option<i64> {
        self.with_room(room_id, RoomTimeline::last_known_timestamp).flatten()
    }

    pub fn online(&self, room_id: &str) -> Option<u64> {
        self.with_room(room_id, RoomTimeline::online).flatten()
    }

    pub fn set_online(&self, room_id: &str, online: u64) {
        self.rooms.write().entry(room_id.to_string()).or_default().online = Some(online);
        self.publish(TimelineUpdate::Presence {
            room_id: room_id.to_string(),
            online,
        });
    }

    /// Claim the room's single history-fetch slot
    ///
    /// Returns the cursor to request from. Rejected without side effects
    /// when a fetch is in flight, the room has no more history, or there is
    /// no cursor yet.
    pub fn begin_history_fetch(&self, room_id: &str) -> Result<i64, FetchRejected> {
        let mut rooms = self.rooms.write();
        let timeline = rooms.get_mut(room_id).ok_or(FetchRejected::NoCursor)?;

        if timeline.loading_more {
            return Err(FetchRejected::InFlight);
        }
        if !timeline.has_more {
            return Err(FetchRejected::Exhausted);
        }
        let cursor = timeline.last_known_timestamp.ok_or(FetchRejected::NoCursor)?;

        timeline.loading_more = true;
        Ok(cursor)
    }

    /// Merge a history page and settle the room's fetch
    pub fn complete_history_fetch(&self, room_id: &str, page: Vec<ChatMessage>, has_more: bool) -> usize {
        let added = {
            let mut rooms = self.rooms.write();
            let timeline = rooms.entry(room_id.to_string()).or_default();
            if !timeline.loading_more {
                debug!(room = %room_id, "History page arrived without an outstanding fetch");
            }
            let added = timeline.merge(page, MergeDirection::Prepend, self.cap);
            timeline.has_more = has_more;
            timeline.loading_more = false;
            added
        };

        self.publish(TimelineUpdate::History {
            room_id: room_id.to_string(),
            added,
            has_more,
        });
        self.fetch_settled.notify_waiters();
        added
    }

    /// Give up a room's fetch slot without merging anything
    pub fn release_history_fetch(&self, room_id: &str) -> bool {
        let released = self
            .rooms
            .write()
            .get_mut(room_id)
            .map(|timeline| std::mem::replace(&mut timeline.loading_more, false))
            .unwrap_or(false);
        if released {
            self.fetch_settled.notify_waiters();
        }
        released
    }

    /// Release every outstanding fetch (connection lost)
    pub fn release_all_fetches(&self) -> usize {
        let mut released = 0;
        for timeline in self.rooms.write().values_mut() {
            if timeline.loading_more {
                timeline.loading_more = false;
                released += 1;
            }
        }
        if released > 0 {
            warn!("Released {} in-flight history fetches", released);
            self.fetch_settled.notify_waiters();
        }
        released
    }

    /// Wait until the room has no outstanding fetch
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_fetch_settled(&self, room_id: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.fetch_settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_loading_more(room_id) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return !self.is_loading_more(room_id);
            }
        }
    }

    /// Drop a room's timeline
    pub fn clear_room(&self, room_id: &str) -> bool {
        let removed = self.rooms.write().remove(room_id);
        match removed {
            Some(timeline) => {
                if timeline.loading_more {
                    self.fetch_settled.notify_waiters();
                }
                self.publish(TimelineUpdate::Cleared {
                    room_id: room_id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Drop every timeline
    pub fn clear(&self) {
        let rooms: Vec<String> = self.rooms.write().drain().map(|(room_id, _)| room_id).collect();
        self.fetch_settled.notify_waiters();
        for room_id in rooms {
            self.publish(TimelineUpdate::Cleared { room_id });
        }
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.read().keys().cloned().collect()
    }
}
