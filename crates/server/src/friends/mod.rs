//! Contacts
//!
//! Established friendships, stored as one `contacts` row per direction.
//! Request/accept bookkeeping happens upstream; this module only records
//! the outcome and answers the eligibility question for the send path.

use crate::store::FriendshipCheck;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Friend manager handles all friend-related operations
pub struct FriendManager {
    pool: SqlitePool,
}

impl FriendManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a friendship in both directions. Already-friends is a no-op.
    pub async fn add_friendship(&self, user_id: &str, other_id: &str) -> Result<()> {
        if user_id == other_id {
            return Err(anyhow::anyhow!("Cannot befriend yourself"));
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for (from, to) in [(user_id, other_id), (other_id, user_id)] {
            sqlx::query(
                "INSERT OR IGNORE INTO contacts (id, user_id, contact_user_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(from)
            .bind(to)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("[Friends] {} <-> {}", user_id, other_id);
        Ok(())
    }

    /// Remove a contact (unfriend), both directions
    pub async fn remove_friendship(&self, user_id: &str, other_id: &str) -> Result<()> {
        sqlx::query(
            "DELETE FROM contacts WHERE
             (user_id = ? AND contact_user_id = ?) OR
             (user_id = ? AND contact_user_id = ?)",
        )
        .bind(user_id)
        .bind(other_id)
        .bind(other_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!("[Friends] Contact removed: {} <-> {}", user_id, other_id);
        Ok(())
    }

    pub async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT contact_user_id FROM contacts WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl FriendshipCheck for FriendManager {
    async fn are_friends(&self, user_id: &str, other_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM contacts WHERE user_id = ? AND contact_user_id = ?")
                .bind(user_id)
                .bind(other_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_pool;
    use crate::users::UserDirectory;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, FriendManager, Vec<String>) {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path()).await.unwrap();
        let users = UserDirectory::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            ids.push(users.create_user(name).await.unwrap().id);
        }
        (temp_dir, FriendManager::new(pool), ids)
    }

    #[tokio::test]
    async fn test_friendship_is_mutual_and_removable() {
        let (_dir, friends, ids) = setup().await;
        let (alice, bob, carol) = (&ids[0], &ids[1], &ids[2]);

        friends.add_friendship(alice, bob).await.unwrap();
        friends.add_friendship(bob, alice).await.unwrap();

        assert!(friends.are_friends(alice, bob).await.unwrap());
        assert!(friends.are_friends(bob, alice).await.unwrap());
        assert!(!friends.are_friends(alice, carol).await.unwrap());
        assert_eq!(friends.list_friend_ids(alice).await.unwrap(), vec![bob.clone()]);

        friends.remove_friendship(bob, alice).await.unwrap();
        assert!(!friends.are_friends(alice, bob).await.unwrap());
        assert!(!friends.are_friends(bob, alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_friendship_rejected() {
        let (_dir, friends, ids) = setup().await;
        assert!(friends.add_friendship(&ids[0], &ids[0]).await.is_err());
    }
}
