//! User directory
//!
//! Identity lookup for the realtime core, backed by the `users` table of the
//! shared SQLite database. Signup and login live outside this crate; the
//! directory only creates accounts so the assistant (and tests) can exist.

use crate::models::UserRecord;
use crate::store::IdentityStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Public user info
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub is_bot: bool,
    pub created_at: DateTime<Utc>,
}

pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a regular account
    pub async fn create_user(&self, username: &str) -> Result<UserInfo> {
        self.insert(username, false).await
    }

    /// Return the assistant account named `name`, creating it on first use
    pub async fn ensure_bot(&self, name: &str) -> Result<UserInfo> {
        if let Some(existing) = self.find_by_username(name).await? {
            if !existing.is_bot {
                return Err(anyhow::anyhow!(
                    "username {} is taken by a regular account",
                    name
                ));
            }
            return Ok(existing);
        }

        let bot = self.insert(name, true).await?;
        info!("[Users] Created assistant account {} ({})", bot.username, bot.id);
        Ok(bot)
    }

    async fn insert(&self, username: &str, is_bot: bool) -> Result<UserInfo> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            return Err(anyhow::anyhow!("Username already registered: {}", username));
        }

        let user = UserInfo {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            is_bot,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO users (id, username, is_bot, created_at) VALUES (?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.username)
            .bind(user.is_bot)
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        info!("[Users] Registered {}", username);
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserInfo>> {
        let row: Option<(String, String, bool, String)> = sqlx::query_as(
            "SELECT id, username, is_bot, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, username, is_bot, created_at)| -> Result<UserInfo> {
            let created_at = created_at
                .parse::<DateTime<Utc>>()
                .with_context(|| format!("Bad created_at on user {}", id))?;
            Ok(UserInfo {
                id,
                username,
                is_bot,
                created_at,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl IdentityStore for UserDirectory {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let row: Option<(String, String, bool)> =
            sqlx::query_as("SELECT id, username, is_bot FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, username, is_bot)) = row else {
            return Ok(None);
        };

        let friend_ids: Vec<(String,)> = sqlx::query_as(
            "SELECT contact_user_id FROM contacts WHERE user_id = ? ORDER BY created_at",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserRecord {
            id,
            username,
            is_bot,
            friend_ids: friend_ids.into_iter().map(|(f,)| f).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_pool;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_bot_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let users = UserDirectory::new(open_pool(temp_dir.path()).await.unwrap());

        let first = users.ensure_bot("ChatterBot").await.unwrap();
        let second = users.ensure_bot("ChatterBot").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_bot);

        let record = users.find_user_by_id(&first.id).await.unwrap().unwrap();
        assert!(record.is_bot);
        assert!(record.friend_ids.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_bot_refuses_regular_account() {
        let temp_dir = TempDir::new().unwrap();
        let users = UserDirectory::new(open_pool(temp_dir.path()).await.unwrap());

        users.create_user("ChatterBot").await.unwrap();
        assert!(users.ensure_bot("ChatterBot").await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path()).await.unwrap();
        let users = UserDirectory::new(pool.clone());
        users.create_user("alice").await.unwrap();
        sqlx::query("UPDATE users SET created_at = 'not a date'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(users.find_by_username("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_user_resolves_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let users = UserDirectory::new(open_pool(temp_dir.path()).await.unwrap());
        assert!(users.find_user_by_id("missing").await.unwrap().is_none());
    }
}
