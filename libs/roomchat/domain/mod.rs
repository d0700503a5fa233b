//! Domain Layer
//!
//! Chat rooms, messages and timelines.
//! This layer has no dependencies on infrastructure or application layers.

pub mod models;
pub mod timeline;

pub use models::{ChatMessage, ChatTarget, MergeDirection, RoomKind, Sender};
pub use timeline::{FetchRejected, RoomTimeline, TimelineStore, TimelineUpdate, DEFAULT_TIMELINE_CAP};
