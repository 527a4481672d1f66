//! In-memory collaborators for unit tests

use crate::ai::ReplyGenerator;
use crate::filter::{ContentFilter, FilterVerdict};
use crate::models::{MessageContent, StoredMessage, TranscriptTurn, UserRecord};
use crate::store::{FriendshipCheck, IdentityStore, MessageStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<StoredMessage>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn all(&self) -> Vec<StoredMessage> {
        self.messages.lock().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn between(&self, a: &str, b: &str) -> Vec<StoredMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.recipient_id == b)
                    || (m.sender_id == b && m.recipient_id == a)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn persist(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &MessageContent,
    ) -> Result<StoredMessage> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("store unavailable"));
        }
        let message = StoredMessage {
            record_id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.clone(),
            created_at: Utc::now(),
        };
        self.messages.lock().push(message.clone());
        Ok(message)
    }

    async fn recent_between(&self, a: &str, b: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        Ok(self.between(a, b).into_iter().rev().take(limit).collect())
    }

    async fn recent_before(
        &self,
        a: &str,
        b: &str,
        record_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conversation = self.between(a, b);
        let Some(pos) = conversation.iter().position(|m| m.record_id == record_id) else {
            return Ok(Vec::new());
        };
        Ok(conversation[..pos].iter().rev().take(limit).cloned().collect())
    }

    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>> {
        Ok(self.between(a, b))
    }
}

/// Users and friendships in one map
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryDirectory {
    pub fn with_user(self, id: &str) -> Self {
        self.insert(id, false);
        self
    }

    pub fn with_bot(self, id: &str) -> Self {
        self.insert(id, true);
        self
    }

    pub fn with_friends(self, a: &str, b: &str) -> Self {
        let mut users = self.users.lock();
        for (from, to) in [(a, b), (b, a)] {
            if let Some(user) = users.get_mut(from) {
                user.friend_ids.push(to.to_string());
            }
        }
        drop(users);
        self
    }

    fn insert(&self, id: &str, is_bot: bool) {
        self.users.lock().insert(
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                username: id.to_string(),
                is_bot,
                friend_ids: Vec::new(),
            },
        );
    }
}

#[async_trait]
impl IdentityStore for MemoryDirectory {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.lock().get(id).cloned())
    }
}

#[async_trait]
impl FriendshipCheck for MemoryDirectory {
    async fn are_friends(&self, user_id: &str, other_id: &str) -> Result<bool> {
        Ok(self
            .users
            .lock()
            .get(user_id)
            .is_some_and(|u| u.is_friend_of(other_id)))
    }
}

/// Returns a fixed reply and records what it was asked
pub struct ScriptedGenerator {
    reply: String,
    calls: Mutex<Vec<(String, Vec<TranscriptTurn>)>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn last_transcript(&self) -> Vec<TranscriptTurn> {
        self.calls
            .lock()
            .last()
            .map(|(_, t)| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, transcript: &[TranscriptTurn]) -> Result<String> {
        self.calls
            .lock()
            .push((prompt.to_string(), transcript.to_vec()));
        Ok(self.reply.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _transcript: &[TranscriptTurn]) -> Result<String> {
        Err(anyhow::anyhow!("model offline"))
    }
}

/// Filter whose backend is down
pub struct BrokenFilter;

#[async_trait]
impl ContentFilter for BrokenFilter {
    async fn filter(&self, _text: &str) -> Result<FilterVerdict> {
        Err(anyhow::anyhow!("filter service unreachable"))
    }
}
