//! Chat server configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::Level;

use crate::ai::ResponderConfig;
use crate::friends::FriendManager;
use crate::pipeline::MessagePipeline;
use crate::realtime::RealtimeHub;
use crate::store::SqliteMessageStore;
use crate::users::UserDirectory;

/// Configuration for the Chatter server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory holding `chatter.sqlite`
    pub data_dir: PathBuf,
    pub port: u16,
    /// Username of the assistant account, created on startup
    pub bot_name: String,
    /// Schedule assistant replies
    pub enable_ai: bool,
    /// Push accepted messages to the sender's own connections too
    pub echo_to_sender: bool,
    pub log_level: Level,
    pub responder: ResponderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("chatter_data"),
            port: 5001,
            bot_name: "ChatterBot".to_string(),
            enable_ai: true,
            echo_to_sender: false,
            log_level: Level::INFO,
            responder: ResponderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `CHATTER_*` environment variables.
    ///
    /// Unparseable values fall back to the default for that field.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(root) = lookup("CHATTER_ROOT") {
            config.data_dir = PathBuf::from(root);
        }
        if let Some(port) = lookup("CHATTER_PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(name) = lookup("CHATTER_BOT_NAME").filter(|v| !v.trim().is_empty()) {
            config.bot_name = name;
        }
        if let Some(model) = lookup("CHATTER_MODEL").filter(|v| !v.trim().is_empty()) {
            config.responder.model = model;
        }
        if let Some(ms) = lookup("CHATTER_RESPONDER_DELAY_MS").and_then(|v| v.parse().ok()) {
            config.responder.delay = Duration::from_millis(ms);
        }
        if let Some(window) = lookup("CHATTER_HISTORY_WINDOW").and_then(|v| v.parse().ok()) {
            config.responder.history_window = window;
        }
        if let Some(echo) = lookup("CHATTER_ECHO_TO_SENDER") {
            config.echo_to_sender = matches!(echo.as_str(), "1" | "true" | "yes");
        }
        if lookup("DISABLE_AI").is_some() {
            config.enable_ai = false;
        }
        if let Some(level) = lookup("CHATTER_LOG").and_then(|v| v.parse().ok()) {
            config.log_level = level;
        }

        config
    }

    /// Ensure the data directory exists
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Username of the assistant account
    pub bot_name: String,
    pub hub: RealtimeHub,
    pub pipeline: Arc<MessagePipeline>,
    pub users: Arc<UserDirectory>,
    pub friends: Arc<FriendManager>,
    pub messages: Arc<SqliteMessageStore>,
}
