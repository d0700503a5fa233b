//! External service clients

pub mod chat;
pub mod session;

pub use chat::{classify, Inbound, RoomContext};
pub use session::{HttpSessionClient, SessionApiError, SessionGrant, SessionProvider};
