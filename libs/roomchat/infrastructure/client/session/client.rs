//! Session service client
//!
//! Exchanges a caller's access token and chat target for a short-lived
//! chat session token.

use super::types::{SessionGrant, SessionRequest, SessionResponse};
use crate::domain::ChatTarget;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SessionApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Session rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, SessionApiError>;

/// Source of chat session tokens
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    async fn create_session(&self, target: &ChatTarget) -> Result<SessionGrant>;
}

/// HTTP implementation of [`SessionProvider`]
pub struct HttpSessionClient {
    base_url: String,
    access_token: Option<String>,
    client: Client,
}

impl HttpSessionClient {
    /// Create a client for the given API base URL
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
            client,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SessionProvider for HttpSessionClient {
    async fn create_session(&self, target: &ChatTarget) -> Result<SessionGrant> {
        let url = format!("{}/chat/session", self.base_url);
        let body = SessionRequest::from(target);

        debug!(room = %target.room_id, chat_type = %target.kind, "POST {}", url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(room = %target.room_id, %status, "Session request failed");
            return Err(SessionApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let reply: SessionResponse = response
            .json()
            .await
            .map_err(|e| SessionApiError::DeserializeFailed(e.to_string()))?;

        let grant = reply.into_grant().map_err(SessionApiError::Rejected)?;
        info!(room = %target.room_id, "Chat session granted");
        Ok(grant)
    }
}
