//! Chatter Server Library
//!
//! Presence tracking and direct-message fan-out over websockets, with an
//! optional assistant account that answers messages sent to it.

pub mod ai;
pub mod config;
pub mod error;
pub mod filter;
pub mod friends;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod realtime;
pub mod store;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    routing::{get, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use ai::{GenAiGenerator, ReplyGenerator, ResponderScheduler};
use config::{AppState, ServerConfig};
use filter::WordListFilter;
use friends::FriendManager;
use handlers::{
    add_friend, get_bot, get_history, health_check, list_friends, list_online, remove_friend,
    send_message, ws_upgrade,
};
use pipeline::MessagePipeline;
use realtime::RealtimeHub;
use store::SqliteMessageStore;
use users::UserDirectory;

pub async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    info!("=== Chatter Server ===");
    info!("Data directory: {:?}", config.data_dir);

    let generator: Option<Arc<dyn ReplyGenerator>> = if config.enable_ai {
        Some(Arc::new(GenAiGenerator::new(&config.responder)))
    } else {
        info!("[Responder] Disabled");
        None
    };

    let state = build_state(&config, generator).await?;
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Open storage, make sure the assistant account exists and wire the
/// pipeline. Without a generator, messages to the bot are stored but never
/// answered.
pub async fn build_state(
    config: &ServerConfig,
    generator: Option<Arc<dyn ReplyGenerator>>,
) -> anyhow::Result<AppState> {
    config.ensure_dirs().await?;
    let pool = store::open_pool(&config.data_dir).await?;

    let users = Arc::new(UserDirectory::new(pool.clone()));
    let friends = Arc::new(FriendManager::new(pool.clone()));
    let messages = Arc::new(SqliteMessageStore::new(pool));
    info!("Storage initialized");

    let bot = users.ensure_bot(&config.bot_name).await?;
    info!("[Responder] Assistant account {} ({})", bot.username, bot.id);

    let hub = RealtimeHub::new();
    let mut pipeline = MessagePipeline::new(
        users.clone(),
        friends.clone(),
        Arc::new(WordListFilter::default()),
        messages.clone(),
        hub.clone(),
    )
    .with_sender_echo(config.echo_to_sender);

    if let Some(generator) = generator {
        pipeline = pipeline.with_responder(ResponderScheduler::new(
            config.responder.clone(),
            messages.clone(),
            generator,
            hub.router().clone(),
        ));
    }

    Ok(AppState {
        bot_name: bot.username,
        hub,
        pipeline: Arc::new(pipeline),
        users,
        friends,
        messages,
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Realtime connection
        .route("/ws", get(ws_upgrade))
        // Direct messages
        .route("/messages/{user_id}", put(send_message).get(get_history))
        // Presence
        .route("/users/online", get(list_online))
        // Assistant account
        .route("/ai/bot", get(get_bot))
        // Contacts
        .route("/friends", get(list_friends))
        .route("/friends/{user_id}", put(add_friend).delete(remove_friend))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
