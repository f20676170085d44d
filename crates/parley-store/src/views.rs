//! Query composer: the enriched, client-facing views.
//!
//! Stored rows never leave the crate on their own. Every view resolves live
//! presence for the users it mentions, aggregates reactions, resolves file
//! URLs and applies the soft-delete transform. Each query runs its reads in
//! one SQLite read transaction so that all parts come from the same snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_shared::{ConversationId, MessageId, UserId};
use serde::Serialize;

use crate::conversations::load_conversation;
use crate::database::Database;
use crate::error::Result;
use crate::messages::load_message;
use crate::models::{Conversation, FileAttachment, Message, User};
use crate::reactions::{summarize_reactions, ReactionSummary};
use crate::users::load_user;

/// Maps an object-storage reference to a fetchable URL.
pub trait FileUrlResolver {
    fn file_url(&self, storage_ref: &str) -> Option<String>;
}

impl<F> FileUrlResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn file_url(&self, storage_ref: &str) -> Option<String> {
        self(storage_ref)
    }
}

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

/// A user profile with live presence merged in.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Render inline.
    Image,
    /// Offer as a named download link.
    File,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentView {
    pub kind: AttachmentKind,
    pub url: Option<String>,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender: Option<UserView>,
    pub body: String,
    pub attachment: Option<AttachmentView>,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub reactions: Vec<ReactionSummary>,
}

/// Last message as shown in the conversation list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub body: String,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: ConversationId,
    pub is_group: bool,
    pub title: Option<String>,
    pub member_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Direct conversations: the member who is not the viewer.
    pub other_member: Option<UserView>,
    /// Group conversations: members other than the viewer.
    pub group_members: Vec<UserView>,
    pub group_online_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListItem {
    #[serde(flatten)]
    pub conversation: ConversationView,
    pub last_message: Option<MessagePreview>,
    pub unread_count: u32,
    pub typing_users: Vec<String>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Database {
    pub fn user_view(&self, user: &User) -> Result<UserView> {
        let (is_online, last_seen) = self.effective_presence(user)?;
        Ok(UserView {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            is_online,
            last_seen,
        })
    }

    /// `getCurrentUser`.
    pub fn current_user(&self, caller: &User) -> Result<UserView> {
        self.user_view(caller)
    }

    /// `listConversations`: the caller's conversations, latest activity first,
    /// with last message, unread count and active typists.
    pub fn list_conversations(&self, caller: &User) -> Result<Vec<ConversationListItem>> {
        let _snapshot = self.conn().unchecked_transaction()?;
        let now = self.now();

        let unread = self.unread_counts_for_user(caller.id)?;
        let mut profiles = Profiles::new(self);

        let mut items = Vec::new();
        for conversation in self.conversations_for_user(caller.id)? {
            let last_message = match conversation.last_message_id {
                Some(id) => match load_message(self.conn(), id)? {
                    Some(message) => Some(preview(message, &mut profiles)?),
                    None => None,
                },
                None => None,
            };
            let typing_users = self.active_typists(conversation.id, caller.id, now)?;
            let unread_count = unread.get(&conversation.id).copied().unwrap_or(0);

            items.push(ConversationListItem {
                conversation: conversation_view(conversation, caller.id, &mut profiles)?,
                last_message,
                unread_count,
                typing_users,
            });
        }
        Ok(items)
    }

    /// `getConversation`: `None` both for unknown ids and for conversations
    /// the caller is not part of.
    pub fn get_conversation(
        &self,
        caller: &User,
        id: ConversationId,
    ) -> Result<Option<ConversationView>> {
        let _snapshot = self.conn().unchecked_transaction()?;

        match load_conversation(self.conn(), id)? {
            Some(conversation) if conversation.is_member(caller.id) => {
                let mut profiles = Profiles::new(self);
                Ok(Some(conversation_view(conversation, caller.id, &mut profiles)?))
            }
            _ => Ok(None),
        }
    }

    /// `listMessages`: oldest first, with sender, attachment URL and reaction
    /// summary. Non-members get an empty list.
    pub fn list_messages(
        &self,
        caller: &User,
        conversation_id: ConversationId,
        urls: &dyn FileUrlResolver,
    ) -> Result<Vec<MessageView>> {
        let _snapshot = self.conn().unchecked_transaction()?;

        match load_conversation(self.conn(), conversation_id)? {
            Some(conversation) if conversation.is_member(caller.id) => {}
            _ => return Ok(Vec::new()),
        }

        let mut reactions = self.reactions_for_conversation(conversation_id)?;
        let mut profiles = Profiles::new(self);

        let mut views = Vec::new();
        for message in self.messages_for_conversation(conversation_id)? {
            let message = message.into_visible();
            let summary = reactions
                .remove(&message.id)
                .map(|r| summarize_reactions(&r, caller.id))
                .unwrap_or_default();

            views.push(MessageView {
                id: message.id,
                conversation_id: message.conversation_id,
                sender_id: message.sender_id,
                sender: profiles.get(message.sender_id)?,
                attachment: message.file.as_ref().map(|file| attachment_view(file, urls)),
                body: message.body,
                created_at: message.created_at,
                deleted: message.deleted_at.is_some(),
                deleted_at: message.deleted_at,
                reactions: summary,
            });
        }
        Ok(views)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Per-query profile cache so a user mentioned many times is loaded once.
struct Profiles<'a> {
    db: &'a Database,
    cache: HashMap<UserId, Option<UserView>>,
}

impl<'a> Profiles<'a> {
    fn new(db: &'a Database) -> Self {
        Self {
            db,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, id: UserId) -> Result<Option<UserView>> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(cached.clone());
        }
        let view = match load_user(self.db.conn(), id)? {
            Some(user) => Some(self.db.user_view(&user)?),
            None => None,
        };
        self.cache.insert(id, view.clone());
        Ok(view)
    }
}

fn conversation_view(
    conversation: Conversation,
    viewer: UserId,
    profiles: &mut Profiles<'_>,
) -> Result<ConversationView> {
    let mut others = Vec::new();
    for member in conversation.member_ids.iter().filter(|id| **id != viewer) {
        if let Some(view) = profiles.get(*member)? {
            others.push(view);
        }
    }

    let (other_member, group_members) = if conversation.is_group {
        (None, others)
    } else {
        (others.into_iter().next(), Vec::new())
    };
    let group_online_count = group_members.iter().filter(|m| m.is_online).count();

    Ok(ConversationView {
        id: conversation.id,
        is_group: conversation.is_group,
        title: conversation.title,
        member_ids: conversation.member_ids,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
        other_member,
        group_members,
        group_online_count,
    })
}

fn preview(message: Message, profiles: &mut Profiles<'_>) -> Result<MessagePreview> {
    let message = message.into_visible();
    let sender_name = profiles.get(message.sender_id)?.map(|u| u.name);

    Ok(MessagePreview {
        id: message.id,
        sender_id: message.sender_id,
        sender_name,
        file_name: message.file.map(|f| f.file_name),
        body: message.body,
        created_at: message.created_at,
        deleted: message.deleted_at.is_some(),
    })
}

fn attachment_view(file: &FileAttachment, urls: &dyn FileUrlResolver) -> AttachmentView {
    AttachmentView {
        kind: if file.is_image() {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        },
        url: urls.file_url(&file.storage_ref),
        file_name: file.file_name.clone(),
        file_type: file.file_type.clone(),
        file_size: file.file_size,
    }
}
