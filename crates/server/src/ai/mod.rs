//! ChatterBot responder
//!
//! When a message lands in a conversation with the assistant account, a
//! one-shot [`ResponderTask`] is scheduled. After a short "thinking" delay it:
//! - pulls the last few messages of the conversation as a transcript
//! - asks the [`ReplyGenerator`] for a reply
//! - persists the reply as a message from the bot
//! - delivers it to the human's live connections
//!
//! Every failure inside a task is logged and dropped. Nothing is retried and
//! nothing reaches the caller that triggered the task.

use crate::error::ResponderError;
use crate::models::{MessageContent, MessageEvent, Role, ServerEvent, TranscriptTurn};
use crate::realtime::DeliveryRouter;
use crate::store::MessageStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// GenAI imports
use genai::chat::{ChatMessage, ChatRequest};
use genai::Client as GenAIClient;

/// Responder configuration
#[derive(Clone, Debug)]
pub struct ResponderConfig {
    /// Model to use
    pub model: String,
    /// System prompt
    pub system_prompt: String,
    /// Simulated typing latency before a reply is produced
    pub delay: Duration,
    /// Max prior messages handed to the generator
    pub history_window: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: "ollama::qwen3:4b".to_string(),
            system_prompt: "You are ChatterBot, the friendly assistant inside the Chatter messenger. Keep responses concise and conversational.".to_string(),
            delay: Duration::from_millis(1500),
            history_window: 6,
        }
    }
}

/// Produces reply text for the assistant
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, transcript: &[TranscriptTurn]) -> Result<String>;
}

/// [`ReplyGenerator`] backed by the genai client
pub struct GenAiGenerator {
    client: GenAIClient,
    model: String,
    system_prompt: String,
}

impl GenAiGenerator {
    pub fn new(config: &ResponderConfig) -> Self {
        info!("[Responder] Using model: {}", config.model);
        Self {
            client: GenAIClient::default(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

#[async_trait]
impl ReplyGenerator for GenAiGenerator {
    async fn generate(&self, prompt: &str, transcript: &[TranscriptTurn]) -> Result<String> {
        let mut chat_messages = vec![ChatMessage::system(&self.system_prompt)];

        for turn in transcript {
            match turn.role {
                Role::Assistant => chat_messages.push(ChatMessage::assistant(&turn.text)),
                Role::User => chat_messages.push(ChatMessage::user(&turn.text)),
            }
        }
        chat_messages.push(ChatMessage::user(prompt));

        let chat_req = ChatRequest::new(chat_messages);

        debug!("[Responder] Calling {} for response...", self.model);

        let response = self
            .client
            .exec_chat(&self.model, chat_req, None)
            .await
            .map_err(|e| anyhow::anyhow!("GenAI error: {}", e))?;

        let text = response
            .first_text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GenAI returned no text"))?;

        Ok(text.to_string())
    }
}

/// One scheduled reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderTask {
    pub bot_id: String,
    /// The human who wrote the trigger and will receive the reply
    pub user_id: String,
    pub trigger_record_id: String,
    pub trigger_text: String,
    pub fire_at: DateTime<Utc>,
}

/// Handle to a scheduled [`ResponderTask`].
///
/// Dropping it detaches the task; it still fires.
pub struct ResponderHandle {
    task: ResponderTask,
    join: JoinHandle<Option<MessageEvent>>,
}

impl ResponderHandle {
    pub fn task(&self) -> &ResponderTask {
        &self.task
    }

    /// Abort the task if it has not fired yet
    pub fn cancel(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task. `None` if it failed or was cancelled.
    pub async fn join(self) -> Option<MessageEvent> {
        self.join.await.ok().flatten()
    }
}

#[derive(Clone)]
pub struct ResponderScheduler {
    config: ResponderConfig,
    store: Arc<dyn MessageStore>,
    generator: Arc<dyn ReplyGenerator>,
    router: DeliveryRouter,
}

impl ResponderScheduler {
    pub fn new(
        config: ResponderConfig,
        store: Arc<dyn MessageStore>,
        generator: Arc<dyn ReplyGenerator>,
        router: DeliveryRouter,
    ) -> Self {
        Self {
            config,
            store,
            generator,
            router,
        }
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Build the task answering `trigger`, a message addressed to the bot
    pub fn task_for(&self, trigger: &MessageEvent) -> ResponderTask {
        let delay = chrono::Duration::from_std(self.config.delay)
            .unwrap_or_else(|_| chrono::Duration::zero());
        ResponderTask {
            bot_id: trigger.recipient_id.clone(),
            user_id: trigger.sender_id.clone(),
            trigger_record_id: trigger.record_id.clone(),
            trigger_text: trigger.content.text.clone(),
            fire_at: Utc::now() + delay,
        }
    }

    /// Spawn `task` to fire after the configured delay
    pub fn schedule(&self, task: ResponderTask) -> ResponderHandle {
        let scheduler = self.clone();
        let delay = self.config.delay;
        let spawned = task.clone();

        debug!(
            "[Responder] Reply to {} scheduled in {:?}",
            task.user_id, delay
        );

        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.run(spawned).await
        });

        ResponderHandle { task, join }
    }

    /// Fire `task` now, swallowing any failure
    pub async fn run(&self, task: ResponderTask) -> Option<MessageEvent> {
        let user_id = task.user_id.clone();
        match self.fire(task).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("[Responder] No reply for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Fire `task` now: transcript, generate, persist, deliver.
    ///
    /// Persistence strictly precedes delivery; on any error nothing is delivered.
    pub async fn fire(&self, task: ResponderTask) -> std::result::Result<MessageEvent, ResponderError> {
        let transcript = self.transcript(&task).await?;

        let reply_text = self
            .generator
            .generate(&task.trigger_text, &transcript)
            .await
            .map_err(ResponderError::Generation)?;

        let stored = self
            .store
            .persist(&task.bot_id, &task.user_id, &MessageContent::text(reply_text))
            .await
            .map_err(ResponderError::Persistence)?;

        let reply = MessageEvent::from(stored);
        let pushed = self
            .router
            .deliver(&task.user_id, &ServerEvent::NewMessage(reply.clone()));

        info!(
            "[Responder] Replied to {} (record {}, {} connection(s))",
            task.user_id, reply.record_id, pushed
        );
        Ok(reply)
    }

    /// Messages stored before the trigger, oldest first
    async fn transcript(
        &self,
        task: &ResponderTask,
    ) -> std::result::Result<Vec<TranscriptTurn>, ResponderError> {
        let mut recent = self
            .store
            .recent_before(
                &task.user_id,
                &task.bot_id,
                &task.trigger_record_id,
                self.config.history_window,
            )
            .await
            .map_err(ResponderError::Lookup)?;
        recent.reverse();

        Ok(recent
            .into_iter()
            .map(|m| TranscriptTurn {
                role: if m.sender_id == task.bot_id {
                    Role::Assistant
                } else {
                    Role::User
                },
                text: m.content.text,
            })
            .collect())
    }
}
