//! CLI utilities for binaries
//!
//! Handles configuration loading, environment variables and the chat
//! target arguments for all binary executables.

use roomchat::domain::{ChatTarget, RoomKind};
use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Chat client configuration (config/chat.yaml)
    Chat,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Chat => "config/chat.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Chat => "CHAT_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Arguments
/// * `config_type` - Type of configuration to load
///
/// # Returns
/// Path to the configuration file
///
/// # Examples
/// ```
/// use roomchat_client::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Chat);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Build a chat target from `<watch|match> <room-id> <user-id> [team-id] [match-id]`
pub fn parse_target(args: &[String]) -> Result<ChatTarget, String> {
    let [kind, room_id, user_id, rest @ ..] = args else {
        return Err("usage: <watch|match> <room-id> <user-id> [team-id] [match-id]".to_string());
    };

    let kind: RoomKind = kind.parse()?;
    let mut target = match kind {
        RoomKind::Watch => ChatTarget::watch(room_id.as_str(), user_id.as_str()),
        RoomKind::Match => ChatTarget::match_room(room_id.as_str(), user_id.as_str()),
    };
    if let Some(team_id) = rest.first() {
        target = target.with_team(team_id.as_str());
    }
    if let Some(match_id) = rest.get(1) {
        target = target.with_match(match_id.as_str());
    }
    Ok(target)
}
