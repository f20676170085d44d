//! Conversation store: direct and group conversations and their members.
//!
//! Direct conversations are deduplicated by their direct key. The key column
//! carries a UNIQUE constraint, so lookup-or-insert converges on one row even
//! when both users start the chat at the same time.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parley_shared::constants::MIN_GROUP_MEMBERS;
use parley_shared::types::direct_key;
use parley_shared::{ConversationId, UserId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError, ValidationError};
use crate::models::{Conversation, User};
use crate::sql::{get_id, get_opt_id, get_ts, ts};
use crate::unread;
use crate::users::load_user;

const CONVERSATION_COLUMNS: &str =
    "id, is_group, title, direct_key, last_message_id, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Return the direct conversation between the caller and `other`,
    /// creating it (and both unread counters) if it does not exist yet.
    pub fn start_or_create_direct(
        &mut self,
        caller: &User,
        other: UserId,
    ) -> Result<ConversationId> {
        if other == caller.id {
            return Err(ValidationError::SelfConversation.into());
        }

        let key = direct_key(caller.id, other);
        let now = self.now();
        let tx = self.transaction()?;

        if let Some(id) = find_by_direct_key(&tx, &key)? {
            return Ok(id);
        }

        if load_user(&tx, other)?.is_none() {
            return Err(StoreError::UserNotFound);
        }

        let id = ConversationId::new();
        let inserted = tx.execute(
            "INSERT INTO conversations (id, is_group, title, direct_key, created_at, updated_at)
             VALUES (?1, 0, NULL, ?2, ?3, ?3)
             ON CONFLICT(direct_key) DO NOTHING",
            params![id.to_string(), key, ts(&now)],
        )?;

        if inserted == 0 {
            // Lost the race against the other side; use the winner's row.
            let existing = find_by_direct_key(&tx, &key)?.ok_or(StoreError::ConversationNotFound)?;
            tx.commit()?;
            return Ok(existing);
        }

        let members = [caller.id, other];
        insert_members(&tx, id, &members)?;
        unread::seed(&tx, id, &members, now)?;
        tx.commit()?;

        tracing::info!(conversation = %id, "created direct conversation");
        Ok(id)
    }

    /// Create a titled group with the caller plus `member_ids` (deduplicated).
    pub fn create_group(
        &mut self,
        caller: &User,
        title: &str,
        member_ids: &[UserId],
    ) -> Result<ConversationId> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::InvalidTitle.into());
        }

        let mut seen = HashSet::new();
        let members: Vec<UserId> = std::iter::once(caller.id)
            .chain(member_ids.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect();

        if members.len() < MIN_GROUP_MEMBERS {
            return Err(ValidationError::InsufficientMembers.into());
        }

        let now = self.now();
        let tx = self.transaction()?;

        for member in &members {
            if load_user(&tx, *member)?.is_none() {
                return Err(ValidationError::UnknownMember.into());
            }
        }

        let id = ConversationId::new();
        tx.execute(
            "INSERT INTO conversations (id, is_group, title, direct_key, created_at, updated_at)
             VALUES (?1, 1, ?2, NULL, ?3, ?3)",
            params![id.to_string(), title, ts(&now)],
        )?;
        insert_members(&tx, id, &members)?;
        unread::seed(&tx, id, &members, now)?;
        tx.commit()?;

        tracing::info!(conversation = %id, members = members.len(), "created group conversation");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a conversation row regardless of membership.
    pub fn get_conversation_row(&self, id: ConversationId) -> Result<Option<Conversation>> {
        load_conversation(self.conn(), id)
    }

    /// Fetch a conversation the caller belongs to. Non-members get
    /// [`StoreError::ConversationNotFound`], same as a missing id.
    pub fn member_conversation(
        &self,
        caller: &User,
        id: ConversationId,
    ) -> Result<Conversation> {
        require_member(self.conn(), id, caller.id)
    }

    /// Every conversation containing `user`, most recent activity first.
    pub fn conversations_for_user(&self, user: UserId) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS}
             FROM conversations
             WHERE id IN (SELECT conversation_id FROM conversation_members WHERE user_id = ?1)
             ORDER BY updated_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            let mut conversation = row?;
            conversation.member_ids = load_members(self.conn(), conversation.id)?;
            conversations.push(conversation);
        }
        Ok(conversations)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a conversation and check membership against current rows.
pub(crate) fn require_member(
    conn: &Connection,
    id: ConversationId,
    user: UserId,
) -> Result<Conversation> {
    match load_conversation(conn, id)? {
        Some(conversation) if conversation.is_member(user) => Ok(conversation),
        _ => Err(StoreError::ConversationNotFound),
    }
}

pub(crate) fn load_conversation(
    conn: &Connection,
    id: ConversationId,
) -> Result<Option<Conversation>> {
    let conversation = conn
        .query_row(
            &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
            params![id.to_string()],
            row_to_conversation,
        )
        .optional()?;

    match conversation {
        Some(mut conversation) => {
            conversation.member_ids = load_members(conn, id)?;
            Ok(Some(conversation))
        }
        None => Ok(None),
    }
}

/// Bump the last-message pointer and activity time. Last writer wins.
pub(crate) fn touch(
    conn: &Connection,
    id: ConversationId,
    last_message: parley_shared::MessageId,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET last_message_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![last_message.to_string(), ts(&now), id.to_string()],
    )?;
    Ok(())
}

fn find_by_direct_key(conn: &Connection, key: &str) -> Result<Option<ConversationId>> {
    let id = conn
        .query_row(
            "SELECT id FROM conversations WHERE direct_key = ?1",
            params![key],
            |row| get_id(row, 0),
        )
        .optional()?;
    Ok(id)
}

fn insert_members(conn: &Connection, id: ConversationId, members: &[UserId]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO conversation_members (conversation_id, user_id, position)
         VALUES (?1, ?2, ?3)",
    )?;
    for (position, member) in members.iter().enumerate() {
        stmt.execute(params![id.to_string(), member.to_string(), position as i64])?;
    }
    Ok(())
}

fn load_members(conn: &Connection, id: ConversationId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM conversation_members
         WHERE conversation_id = ?1
         ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![id.to_string()], |row| get_id(row, 0))?;

    let mut members = Vec::new();
    for row in rows {
        members.push(row?);
    }
    Ok(members)
}

/// Map a `rusqlite::Row` to a [`Conversation`] without members.
fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let is_group: i32 = row.get(1)?;

    Ok(Conversation {
        id: get_id(row, 0)?,
        is_group: is_group != 0,
        title: row.get(2)?,
        member_ids: Vec::new(),
        direct_key: row.get(3)?,
        last_message_id: get_opt_id(row, 4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}
