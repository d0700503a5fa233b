//! Chat domain models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of chat room
///
/// Watch rooms are anonymous broadcasts tied to a live event; match rooms
/// are small attributed group chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Watch,
    Match,
}

impl RoomKind {
    /// Value of `chatType` in session requests
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Watch => "watch",
            RoomKind::Match => "match",
        }
    }

    /// Path segment of the chat endpoint (`/ws/<kind>-chat`)
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            RoomKind::Watch => "watch-chat",
            RoomKind::Match => "match-chat",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoomKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "watch" => Ok(RoomKind::Watch),
            "match" => Ok(RoomKind::Match),
            other => Err(format!("unknown room kind '{}'", other)),
        }
    }
}

/// Logical chat target: which room, and who is asking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTarget {
    pub kind: RoomKind,
    pub room_id: String,
    pub user_id: String,
    pub team_id: Option<String>,
    pub match_id: Option<String>,
}

impl ChatTarget {
    pub fn watch(room_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            kind: RoomKind::Watch,
            room_id: room_id.into(),
            user_id: user_id.into(),
            team_id: None,
            match_id: None,
        }
    }

    pub fn match_room(room_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            kind: RoomKind::Match,
            ..Self::watch(room_id, user_id)
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_match(mut self, match_id: impl Into<String>) -> Self {
        self.match_id = Some(match_id.into());
        self
    }

    /// Registry key, unique per room kind and room id
    pub fn room_key(&self) -> String {
        format!("{}:{}", self.kind, self.room_id)
    }
}

/// Who authored a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Sender {
    /// Server-generated notice
    System,
    /// Anonymous broadcast participant
    Anonymous {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    },
    /// Known user in an attributed room
    Attributed {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    },
}

impl Sender {
    /// Display label for terminal output
    pub fn label(&self) -> &str {
        match self {
            Sender::System => "system",
            Sender::Anonymous { nickname } => nickname.as_deref().unwrap_or("anon"),
            Sender::Attributed { user_id, nickname } => nickname.as_deref().unwrap_or(user_id),
        }
    }
}

/// One chat message in a room timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub sender: Sender,
}

impl ChatMessage {
    /// Identity used for deduplication; empty ids never match
    pub fn identity(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Where a merged batch goes relative to the existing timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDirection {
    /// Live or newer traffic, placed after the existing timeline
    Append,
    /// History page, placed before the existing timeline
    Prepend,
}
