use anyhow::Result;
use roomchat::{
    init_tracing_with_level, ChatConfig, ChatMessage, ChatSession, HttpSessionClient, SessionOptions, ShutdownManager,
    TimelineUpdate,
};
use roomchat_client::bin_common::{
    load_config_from_env, parse_args, parse_target, BinaryRunner, ConfigType, RunConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Interactive terminal chat for one room
struct ChatApp {
    run_config: RunConfig,
    session: Arc<ChatSession>,
    shutdown: ShutdownManager,
    sent: usize,
}

impl ChatApp {
    async fn handle_input(&mut self, line: &str) {
        let mut parts = line.splitn(2, ' ');
        let command = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim).unwrap_or_default();

        match command {
            "" => {}
            "/quit" => self.shutdown.trigger(),
            "/status" => print_status(&self.session),
            "/more" => {
                let session = Arc::clone(&self.session);
                tokio::spawn(async move {
                    let room = session.room_id().to_string();
                    match session.load_more_messages(&room).await {
                        Ok(true) => {}
                        Ok(false) => info!("No older messages to load"),
                        Err(e) => warn!("Could not load history: {}", e),
                    }
                });
            }
            "/join" if !argument.is_empty() => {
                if let Err(e) = self.session.join_room(argument, serde_json::Value::Null) {
                    warn!("Could not join {}: {}", argument, e);
                }
            }
            "/leave" if !argument.is_empty() => {
                if let Err(e) = self.session.leave_room(argument) {
                    warn!("Could not leave {}: {}", argument, e);
                }
            }
            _ => match self.session.send_message(line) {
                Ok(()) => self.sent += 1,
                Err(e) => warn!("Message not sent: {}", e),
            },
        }
    }
}

impl BinaryRunner for ChatApp {
    async fn run(&mut self) -> Result<()> {
        self.session.connect().await?;

        let room = self.session.room_id().to_string();
        for message in self.session.messages(&room) {
            print_message(&message);
        }
        info!("Type a message and press Enter. Commands: /more /status /join <room> /leave <room> /quit");

        let mut updates = self.session.subscribe_timeline();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut status_tick = tokio::time::interval(self.run_config.status_interval());
        status_tick.tick().await;

        while self.shutdown.is_running() {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                update = updates.recv() => match update {
                    Ok(TimelineUpdate::Live(message)) => print_message(&message),
                    Ok(TimelineUpdate::History { room_id, added, has_more }) => {
                        info!("Loaded {} older messages in {} (more: {})", added, room_id, has_more);
                    }
                    Ok(TimelineUpdate::Presence { online, .. }) => info!("{} online", online),
                    Ok(TimelineUpdate::Cleared { room_id }) => info!("Timeline cleared: {}", room_id),
                    Err(RecvError::Lagged(skipped)) => warn!("Skipped {} timeline updates", skipped),
                    Err(RecvError::Closed) => break,
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_input(line.trim()).await,
                    Ok(None) => {
                        info!("Input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read input: {}", e);
                        break;
                    }
                },
                _ = status_tick.tick() => print_status(&self.session),
            }
        }

        self.session.destroy();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        Some(format!("Messages sent: {}", self.sent))
    }
}

fn print_message(message: &ChatMessage) {
    let time = chrono::DateTime::from_timestamp_millis(message.timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!("[{}] {}: {}", time, message.sender.label(), message.content);
}

fn print_status(session: &ChatSession) {
    let status = session.status();
    info!(
        "Status: {} (reconnect attempts: {}, last error: {})",
        status.state,
        status.reconnect_attempts,
        status.last_error.as_deref().unwrap_or("none")
    );
    if let Some(metrics) = session.socket_metrics() {
        info!("Socket: {:?}", metrics);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::Chat);
    let config = ChatConfig::load_or_default(&config_path)?;

    // Initialize logging with configured level
    init_tracing_with_level(config.log_level.as_str());
    config.log();

    let target = parse_target(&parse_args()).map_err(anyhow::Error::msg)?;

    let mut provider = HttpSessionClient::with_base_url(&config.api.base_url, config.request_timeout())?;
    match config.require_access_token() {
        Ok(token) => provider = provider.with_access_token(token),
        Err(e) => warn!("{}; requesting a session without credentials", e),
    }

    let session = Arc::new(ChatSession::new(
        target,
        SessionOptions::from_config(&config),
        Arc::new(provider),
    ));

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut app = ChatApp {
        run_config: RunConfig::new("Room Chat").with_status_interval(60),
        session,
        shutdown,
        sent: 0,
    };
    app.execute().await
}
