//! Unread counter: one denormalized count per (conversation, member).
//!
//! Counters are seeded at zero when a conversation is created and updated by
//! [`record_message`] in the same transaction as the message insert, so no
//! reader sees one without the other. A missing row reads as zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_shared::{ConversationId, UserId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::conversations::require_member;
use crate::database::Database;
use crate::error::Result;
use crate::models::{Conversation, UnreadCounter, User};
use crate::sql::{get_id, get_ts, ts};

impl Database {
    /// Reset the caller's counter for a conversation they belong to.
    pub fn mark_conversation_read(
        &mut self,
        caller: &User,
        conversation_id: ConversationId,
    ) -> Result<()> {
        let now = self.now();
        let tx = self.transaction()?;

        require_member(&tx, conversation_id, caller.id)?;
        set_count(&tx, conversation_id, caller.id, 0, now)?;

        tx.commit()?;
        Ok(())
    }

    pub fn unread_count(&self, conversation_id: ConversationId, user: UserId) -> Result<u32> {
        let count: Option<u32> = self
            .conn()
            .query_row(
                "SELECT count FROM unread_counts WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    pub fn get_unread_counter(
        &self,
        conversation_id: ConversationId,
        user: UserId,
    ) -> Result<Option<UnreadCounter>> {
        let counter = self
            .conn()
            .query_row(
                "SELECT conversation_id, user_id, count, updated_at
                 FROM unread_counts WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id.to_string(), user.to_string()],
                |row| {
                    Ok(UnreadCounter {
                        conversation_id: get_id(row, 0)?,
                        user_id: get_id(row, 1)?,
                        count: row.get(2)?,
                        updated_at: get_ts(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(counter)
    }

    /// Counts for every conversation `user` has a counter in.
    pub fn unread_counts_for_user(&self, user: UserId) -> Result<HashMap<ConversationId, u32>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT conversation_id, count FROM unread_counts WHERE user_id = ?1")?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            Ok((get_id::<ConversationId>(row, 0)?, row.get::<_, u32>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (conversation_id, count) = row?;
            counts.insert(conversation_id, count);
        }
        Ok(counts)
    }
}

/// Seed a zero counter for each member. Existing rows are left alone.
pub(crate) fn seed(
    conn: &Connection,
    conversation_id: ConversationId,
    members: &[UserId],
    now: DateTime<Utc>,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO unread_counts (conversation_id, user_id, count, updated_at)
         VALUES (?1, ?2, 0, ?3)
         ON CONFLICT(conversation_id, user_id) DO NOTHING",
    )?;
    for member in members {
        stmt.execute(params![conversation_id.to_string(), member.to_string(), ts(&now)])?;
    }
    Ok(())
}

/// Apply a newly sent message to every member's counter: the sender's goes
/// to zero, everyone else's goes up by one (a missing row starts at one).
///
/// Shared by text and file sends.
pub(crate) fn record_message(
    conn: &Connection,
    conversation: &Conversation,
    sender: UserId,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut bump = conn.prepare(
        "INSERT INTO unread_counts (conversation_id, user_id, count, updated_at)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(conversation_id, user_id) DO UPDATE SET
             count = count + 1,
             updated_at = excluded.updated_at",
    )?;

    for member in &conversation.member_ids {
        if *member == sender {
            set_count(conn, conversation.id, sender, 0, now)?;
        } else {
            bump.execute(params![conversation.id.to_string(), member.to_string(), ts(&now)])?;
        }
    }
    Ok(())
}

fn set_count(
    conn: &Connection,
    conversation_id: ConversationId,
    user: UserId,
    count: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO unread_counts (conversation_id, user_id, count, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(conversation_id, user_id) DO UPDATE SET
             count = excluded.count,
             updated_at = excluded.updated_at",
        params![conversation_id.to_string(), user.to_string(), count, ts(&now)],
    )?;
    Ok(())
}
