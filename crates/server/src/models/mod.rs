use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User record as seen by the realtime core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// The automated responder account
    pub is_bot: bool,
    pub friend_ids: Vec<String>,
}

impl UserRecord {
    pub fn is_friend_of(&self, other_id: &str) -> bool {
        self.friend_ids.iter().any(|id| id == other_id)
    }
}

/// Body of a direct message: text, an image reference, or both
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// True when there is text worth answering (images alone never trigger the bot)
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A message row as returned by the message store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub record_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

/// The payload fanned out to a recipient's connections after persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub record_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for MessageEvent {
    fn from(msg: StoredMessage) -> Self {
        Self {
            record_id: msg.record_id,
            sender_id: msg.sender_id,
            recipient_id: msg.recipient_id,
            content: msg.content,
            created_at: msg.created_at,
        }
    }
}

/// Friend request notice pushed to the affected user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestNotice {
    pub request_id: String,
    pub from_user_id: String,
    pub from_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Events carried on a connection's outbound channel.
///
/// Serialized as JSON text frames tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ServerEvent {
    /// Full online set, never a diff
    #[serde(rename_all = "camelCase")]
    PresenceSnapshot { online_user_ids: BTreeSet<String> },
    NewMessage(MessageEvent),
    FriendRequestAccepted(FriendRequestNotice),
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::PresenceSnapshot { .. } => "presenceSnapshot",
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::FriendRequestAccepted(_) => "friendRequestAccepted",
        }
    }
}

/// Speaker of a transcript turn handed to the reply generator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptTurn {
    pub role: Role,
    pub text: String,
}

/// Input for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageInput {
    #[serde(default)]
    pub content: String,
    pub image: Option<String>,
}

impl From<SendMessageInput> for MessageContent {
    fn from(input: SendMessageInput) -> Self {
        Self {
            text: input.content,
            image: input.image.filter(|i| !i.is_empty()),
        }
    }
}
