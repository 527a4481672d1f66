//! Storage collaborators consumed by the realtime core.
//!
//! The core only needs a user lookup, a friendship predicate and a message
//! store. SQLite-backed implementations live in [`crate::users`],
//! [`crate::friends`] and [`sqlite_store`].

pub mod sqlite_store;

use crate::models::{MessageContent, StoredMessage, UserRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub use sqlite_store::SqliteMessageStore;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
}

#[async_trait]
pub trait FriendshipCheck: Send + Sync {
    /// Whether `user_id` has `other_id` in their friend set
    async fn are_friends(&self, user_id: &str, other_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &MessageContent,
    ) -> Result<StoredMessage>;

    /// Up to `limit` messages exchanged between `a` and `b`, newest first
    async fn recent_between(&self, a: &str, b: &str, limit: usize) -> Result<Vec<StoredMessage>>;

    /// Up to `limit` messages between `a` and `b` stored strictly before
    /// `record_id`, newest first. Unknown `record_id` yields nothing.
    async fn recent_before(
        &self,
        a: &str,
        b: &str,
        record_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// Full conversation between `a` and `b`, oldest first
    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>>;
}

/// Open (creating if missing) the shared SQLite database at `base_dir/chatter.sqlite`
/// and apply the embedded migrations.
pub async fn open_pool(base_dir: &Path) -> Result<SqlitePool> {
    tokio::fs::create_dir_all(base_dir).await?;
    let db_path = base_dir.join("chatter.sqlite");

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}
