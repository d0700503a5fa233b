use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Chat client configuration
///
/// Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api: ApiConfig,
    pub socket: SocketSettings,
    pub reconnect: ReconnectConfig,
    pub timeline: TimelineConfig,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: LogLevel,
}

/// Session service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Caller access token from .env (not in YAML)
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_ms: 10_000,
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketSettings {
    /// Base WebSocket URL; rooms live at `<ws_url>/ws/<kind>-chat`
    pub ws_url: String,
    pub connect_timeout_ms: u64,
    /// Envelope type the server sends once the token is accepted
    pub handshake_ack: Option<String>,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080".to_string(),
            connect_timeout_ms: 15_000,
            handshake_ack: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: usize,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Maximum messages kept per room
    pub cap: usize,
    /// How long `load_more_messages` waits for a history page
    pub history_timeout_ms: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            cap: crate::domain::DEFAULT_TIMELINE_CAP,
            history_timeout_ms: 10_000,
        }
    }
}

/// Log level setting (case-insensitive in YAML)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel("info".to_string())
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl ChatConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_content)
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub fn load_or_default(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        info!("Config file {} not found, using defaults", path.display());
        Self::from_yaml_str("")
    }

    /// Parse YAML, apply environment overrides and validate
    pub fn from_yaml_str(yaml_content: &str) -> Result<Self> {
        let mut config: ChatConfig = if yaml_content.trim().is_empty() {
            ChatConfig::default()
        } else {
            serde_yaml::from_str(yaml_content)?
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CHAT_API_URL") {
            info!("Overriding session API URL from environment variable");
            self.api.base_url = url;
        }
        if let Ok(url) = std::env::var("CHAT_WS_URL") {
            info!("Overriding WebSocket URL from environment variable");
            self.socket.ws_url = url;
        }
        if let Ok(token) = std::env::var("CHAT_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }
        if let Ok(level) = std::env::var("CHAT_LOG_LEVEL") {
            self.log_level = LogLevel(level);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }

        if !self.socket.ws_url.starts_with("ws://") && !self.socket.ws_url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(format!(
                "socket.ws_url must be a ws(s) URL, got '{}'",
                self.socket.ws_url
            )));
        }

        if self.socket.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "socket.connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.base_delay_ms == 0 || self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect delays must satisfy 0 < base_delay_ms <= max_delay_ms".to_string(),
            ));
        }

        if self.timeline.cap == 0 {
            return Err(ConfigError::ValidationError(
                "timeline.cap must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str().to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// The caller access token, required for session requests
    pub fn require_access_token(&self) -> Result<&str> {
        self.api
            .access_token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing("CHAT_ACCESS_TOKEN".to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.socket.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.timeline.history_timeout_ms)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Session API: {}", self.api.base_url);
        info!("  WebSocket: {}", self.socket.ws_url);
        info!("  Connect timeout: {} ms", self.socket.connect_timeout_ms);
        info!(
            "  Reconnect: base {} ms, max {} ms, {} attempts",
            self.reconnect.base_delay_ms, self.reconnect.max_delay_ms, self.reconnect.max_attempts
        );
        info!("  Timeline cap: {}", self.timeline.cap);
        info!("  Log level: {}", self.log_level.as_str());
    }
}
