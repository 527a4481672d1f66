//! Send path for direct messages.
//!
//! Each send runs through fixed gates; the first failure aborts with no side
//! effect past it:
//!
//! 1. resolve sender and recipient
//! 2. friendship, unless the recipient is the assistant
//! 3. content filter
//! 4. persist
//! 5. deliver to the recipient's live connections
//! 6. schedule an assistant reply when the recipient is the bot
//!
//! Step 6 is detached. The caller gets its [`MessageEvent`] right after step 5.

use crate::ai::{ResponderHandle, ResponderScheduler};
use crate::error::{Result, SendError};
use crate::filter::ContentFilter;
use crate::models::{MessageContent, MessageEvent, ServerEvent, StoredMessage, UserRecord};
use crate::realtime::RealtimeHub;
use crate::store::{FriendshipCheck, IdentityStore, MessageStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct MessagePipeline {
    identities: Arc<dyn IdentityStore>,
    friendships: Arc<dyn FriendshipCheck>,
    filter: Arc<dyn ContentFilter>,
    store: Arc<dyn MessageStore>,
    hub: RealtimeHub,
    responder: Option<ResponderScheduler>,
    echo_to_sender: bool,
}

impl MessagePipeline {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        friendships: Arc<dyn FriendshipCheck>,
        filter: Arc<dyn ContentFilter>,
        store: Arc<dyn MessageStore>,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            identities,
            friendships,
            filter,
            store,
            hub,
            responder: None,
            echo_to_sender: false,
        }
    }

    /// Answer messages addressed to bot accounts
    pub fn with_responder(mut self, responder: ResponderScheduler) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Also push each accepted message to the sender's other connections
    pub fn with_sender_echo(mut self, enabled: bool) -> Self {
        self.echo_to_sender = enabled;
        self
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: MessageContent,
    ) -> Result<MessageEvent> {
        self.send_tracked(sender_id, recipient_id, content)
            .await
            .map(|(event, _)| event)
    }

    /// Like [`send_message`](Self::send_message), also returning the handle of
    /// the reply task when one was scheduled.
    pub async fn send_tracked(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: MessageContent,
    ) -> Result<(MessageEvent, Option<ResponderHandle>)> {
        let sender = self.resolve(sender_id).await?;
        let recipient = self.resolve(recipient_id).await?;

        if !recipient.is_bot {
            self.require_friends(&sender, &recipient).await?;
        }

        let verdict = self.filter.filter(&content.text).await.map_err(|e| {
            // Fail closed
            warn!("[Pipeline] Filter unavailable, rejecting: {}", e);
            SendError::ContentRejected
        })?;
        if verdict.blocked {
            info!(
                "[Pipeline] Blocked message from {} to {}",
                sender.id, recipient.id
            );
            return Err(SendError::ContentRejected);
        }
        let content = MessageContent {
            text: verdict.cleaned_text,
            image: content.image,
        };

        let stored = self
            .store
            .persist(&sender.id, &recipient.id, &content)
            .await
            .map_err(|e| {
                warn!("[Pipeline] Persist failed: {}", e);
                SendError::PersistenceFailure(e.to_string())
            })?;

        let event = MessageEvent::from(stored);
        let outbound = ServerEvent::NewMessage(event.clone());
        let pushed = self.hub.deliver(&recipient.id, &outbound);
        if self.echo_to_sender && sender.id != recipient.id {
            self.hub.deliver(&sender.id, &outbound);
        }
        debug!(
            "[Pipeline] {} -> {} stored as {} ({} push(es))",
            sender.id, recipient.id, event.record_id, pushed
        );

        let handle = match &self.responder {
            Some(responder) if recipient.is_bot && event.content.has_text() => {
                Some(responder.schedule(responder.task_for(&event)))
            }
            _ => None,
        };

        Ok((event, handle))
    }

    /// Conversation between `user_id` and `peer_id`, oldest first.
    ///
    /// Readable under the same rule as sending: friends, or the peer is a bot.
    pub async fn history(&self, user_id: &str, peer_id: &str) -> Result<Vec<StoredMessage>> {
        let user = self.resolve(user_id).await?;
        let peer = self.resolve(peer_id).await?;

        if !peer.is_bot {
            self.require_friends(&user, &peer).await?;
        }

        self.store
            .conversation(&user.id, &peer.id)
            .await
            .map_err(|e| SendError::PersistenceFailure(e.to_string()))
    }

    async fn resolve(&self, user_id: &str) -> Result<UserRecord> {
        self.identities
            .find_user_by_id(user_id)
            .await
            .map_err(|e| SendError::PersistenceFailure(e.to_string()))?
            .ok_or_else(|| SendError::NotFound(user_id.to_string()))
    }

    async fn require_friends(&self, user: &UserRecord, other: &UserRecord) -> Result<()> {
        let friends = self
            .friendships
            .are_friends(&user.id, &other.id)
            .await
            .map_err(|e| SendError::PersistenceFailure(e.to_string()))?;
        if friends {
            Ok(())
        } else {
            Err(SendError::Forbidden)
        }
    }
}
