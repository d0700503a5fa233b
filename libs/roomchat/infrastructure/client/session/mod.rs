//! Chat session service client
//!
//! # Example
//!
//! ```rust,ignore
//! use roomchat::infrastructure::client::session::{HttpSessionClient, SessionProvider};
//!
//! let client = HttpSessionClient::with_base_url("https://api.example.com", timeout)?
//!     .with_access_token(access_token);
//! let grant = client.create_session(&ChatTarget::watch("event-1", "user-1")).await?;
//! ```

mod client;
mod types;

pub use client::{HttpSessionClient, Result, SessionApiError, SessionProvider};
pub use types::{SessionGrant, SessionRequest, SessionResponse};
