//! Room Chat Client - Main Library
//!
//! This crate provides the main library for the room chat client,
//! following Clean Architecture principles.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **roomchat**: Chat sessions, timelines and the session service client (re-exported from workspace)
//! - **roomsocket**: Room WebSocket connection library (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use roomchat_client::bin_common::{load_config_from_env, ConfigType};
//! use roomchat_client::roomchat::ChatSession;
//! ```

// Re-export workspace libraries for convenience
pub use roomchat;
pub use roomsocket;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables
    //!
    //! Provides shared functionality for the presentation layer (binaries)
    //! following Clean Architecture principles.

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, parse_args, parse_target, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
