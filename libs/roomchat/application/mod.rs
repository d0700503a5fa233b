//! Application Layer
//!
//! Chat sessions: token exchange, connection status and message routing.
//! This layer depends on domain and infrastructure layers.

pub mod error;
pub mod registry;
pub mod session;
pub mod status;

pub use error::{ChatError, Result};
pub use registry::{RoomKey, SessionRegistry};
pub use session::{ChatSession, SessionOptions};
pub use status::{ConnectionSnapshot, ConnectionStatus};
