//! SQLite message store

use super::MessageStore;
use crate::models::{MessageContent, StoredMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

type MessageRow = (String, String, String, String, Option<String>, String);

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_message(
    (id, sender_id, recipient_id, content, image, created_at): MessageRow,
) -> Result<StoredMessage> {
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("Bad created_at on message {}", id))?
        .with_timezone(&Utc);
    Ok(StoredMessage {
        record_id: id,
        sender_id,
        recipient_id,
        content: MessageContent {
            text: content,
            image,
        },
        created_at,
    })
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn persist(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &MessageContent,
    ) -> Result<StoredMessage> {
        let message = StoredMessage {
            record_id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.clone(),
            created_at: Utc::now(),
        };

        // seq gives a total insertion order even when timestamps collide
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, recipient_id, content, image, created_at, seq)
            VALUES (?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM messages))
            "#,
        )
        .bind(&message.record_id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(&content.text)
        .bind(&content.image)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    async fn recent_between(&self, a: &str, b: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, sender_id, recipient_id, content, image, created_at
            FROM messages
            WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn recent_before(
        &self,
        a: &str,
        b: &str,
        record_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, sender_id, recipient_id, content, image, created_at
            FROM messages
            WHERE ((sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?))
              AND seq < (SELECT seq FROM messages WHERE id = ?)
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(record_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, sender_id, recipient_id, content, image, created_at
            FROM messages
            WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
            ORDER BY seq ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_pool;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteMessageStore) {
        let temp_dir = TempDir::new().unwrap();
        let pool = open_pool(temp_dir.path()).await.unwrap();
        (temp_dir, SqliteMessageStore::new(pool))
    }

    #[tokio::test]
    async fn test_recent_between_is_newest_first_and_bounded() {
        let (_dir, store) = store().await;
        for i in 0..8 {
            let (from, to) = if i % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
            store
                .persist(from, to, &MessageContent::text(format!("m{}", i)))
                .await
                .unwrap();
        }
        store
            .persist("alice", "carol", &MessageContent::text("elsewhere"))
            .await
            .unwrap();

        let recent = store.recent_between("bob", "alice", 6).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.content.text.as_str()).collect();
        assert_eq!(texts, vec!["m7", "m6", "m5", "m4", "m3", "m2"]);
    }

    #[tokio::test]
    async fn test_recent_before_ignores_later_messages() {
        let (_dir, store) = store().await;
        store
            .persist("bot", "alice", &MessageContent::text("earlier"))
            .await
            .unwrap();
        let trigger = store
            .persist("alice", "bot", &MessageContent::text("first"))
            .await
            .unwrap();
        store
            .persist("alice", "bot", &MessageContent::text("second"))
            .await
            .unwrap();

        let before = store
            .recent_before("alice", "bot", &trigger.record_id, 6)
            .await
            .unwrap();
        let texts: Vec<_> = before.iter().map(|m| m.content.text.as_str()).collect();
        assert_eq!(texts, vec!["earlier"]);
        assert!(store
            .recent_before("alice", "bot", "missing", 6)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_an_error() {
        let (_dir, store) = store().await;
        store
            .persist("alice", "bob", &MessageContent::text("hi"))
            .await
            .unwrap();
        sqlx::query("UPDATE messages SET created_at = 'yesterday'")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.conversation("alice", "bob").await.is_err());
    }

    #[tokio::test]
    async fn test_conversation_round_trips_image_and_order() {
        let (_dir, store) = store().await;
        let first = store
            .persist(
                "alice",
                "bob",
                &MessageContent::text("look").with_image("https://img/cat.png"),
            )
            .await
            .unwrap();
        store
            .persist("bob", "alice", &MessageContent::text("nice"))
            .await
            .unwrap();

        let convo = store.conversation("alice", "bob").await.unwrap();
        assert_eq!(convo.len(), 2);
        assert_eq!(convo[0], first);
        assert_eq!(convo[1].sender_id, "bob");
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
