//! Infrastructure Layer
//!
//! Implementations of external interfaces: the session service client, the
//! chat wire protocol, configuration, logging and shutdown.
//! This layer depends on the domain layer but not on the application layer.

pub mod client;
pub mod config;
pub mod logging;
pub mod shutdown;

pub use client::{HttpSessionClient, SessionApiError, SessionGrant, SessionProvider};
pub use config::{ChatConfig, ConfigError};
pub use logging::{init_tracing, init_tracing_with_level};
pub use shutdown::ShutdownManager;
