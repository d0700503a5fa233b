use crate::domain::{ChatTarget, RoomKind};
use serde::{Deserialize, Serialize};

/// Body of `POST /chat/session`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub chat_type: RoomKind,
    pub room_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
}

impl From<&ChatTarget> for SessionRequest {
    fn from(target: &ChatTarget) -> Self {
        Self {
            chat_type: target.kind,
            room_id: target.room_id.clone(),
            user_id: target.user_id.clone(),
            team_id: target.team_id.clone(),
            match_id: target.match_id.clone(),
        }
    }
}

/// Session service reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub websocket_url: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A granted chat session
#[derive(Clone, PartialEq)]
pub struct SessionGrant {
    pub token: String,
    /// Base WebSocket URL chosen by the service, if any
    pub websocket_url: Option<String>,
}

impl std::fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGrant")
            .field("token", &"<redacted>")
            .field("websocket_url", &self.websocket_url)
            .finish()
    }
}

impl SessionResponse {
    /// Turn the reply into a grant, or the reason it was refused
    pub fn into_grant(self) -> Result<SessionGrant, String> {
        if !self.success {
            return Err(self
                .error_message
                .unwrap_or_else(|| "session request was rejected".to_string()));
        }
        match self.session_token {
            Some(token) if !token.is_empty() => Ok(SessionGrant {
                token,
                websocket_url: self.websocket_url.filter(|url| !url.is_empty()),
            }),
            _ => Err("session service returned no token".to_string()),
        }
    }
}
