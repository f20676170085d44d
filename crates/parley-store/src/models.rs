//! Row structs persisted in the SQLite database.

use chrono::{DateTime, Utc};
use parley_shared::{ConversationId, MessageId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Application profile linked to an identity-provider subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Stable subject id from the identity provider (unique).
    pub subject: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    /// Coarse online flag; [`Presence`] wins when it exists.
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Profile fields pushed by the client-driven sync step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSync {
    pub subject: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presence {
    pub user_id: UserId,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A direct (two members) or group (three or more, titled) conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub is_group: bool,
    pub title: Option<String>,
    /// Members in creation order, creator first.
    pub member_ids: Vec<UserId>,
    pub direct_key: Option<String>,
    pub last_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    /// Last activity; bumped on every message.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// File metadata attached to a message. The bytes live in object storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub storage_ref: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
}

impl FileAttachment {
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// Empty when the message only carries a file.
    pub body: String,
    pub file: Option<FileAttachment>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The message as readers may see it. Soft-deleted messages keep their
    /// content in storage but come out as tombstones. Every read path goes
    /// through here.
    pub fn into_visible(mut self) -> Self {
        if self.is_deleted() {
            self.body.clear();
            self.file = None;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of `toggle_reaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionToggle {
    Added,
    Removed,
}

// ---------------------------------------------------------------------------
// Typing indicator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingIndicator {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TypingIndicator {
    /// Rows linger after expiry; only this predicate decides visibility.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ---------------------------------------------------------------------------
// Unread counter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCounter {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Answer to `getAuthState`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_authenticated: bool,
    pub has_profile: bool,
}
