//! Message store: text and file messages, soft delete.
//!
//! A send is one transaction: insert the message, move the conversation's
//! last-message pointer, update every member's unread counter and clear the
//! sender's typing indicator.

use chrono::{DateTime, Utc};
use parley_shared::{ConversationId, MessageId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::conversations::{self, require_member};
use crate::database::Database;
use crate::error::{Result, StoreError, ValidationError};
use crate::models::{FileAttachment, Message, User};
use crate::sql::{get_id, get_opt_ts, get_ts, ts};
use crate::{typing, unread};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, body, file_ref, file_name, \
                               file_type, file_size, created_at, deleted_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn send_message(
        &mut self,
        caller: &User,
        conversation_id: ConversationId,
        body: &str,
    ) -> Result<MessageId> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        self.post_message(caller, conversation_id, body.to_string(), None)
    }

    /// Send a message whose content is a file already stored in object
    /// storage. The body is empty.
    pub fn send_file_message(
        &mut self,
        caller: &User,
        conversation_id: ConversationId,
        file: FileAttachment,
    ) -> Result<MessageId> {
        if file.storage_ref.trim().is_empty() {
            return Err(ValidationError::MissingStorageRef.into());
        }
        if file.file_size < 0 {
            return Err(ValidationError::InvalidFileSize.into());
        }
        self.post_message(caller, conversation_id, String::new(), Some(file))
    }

    fn post_message(
        &mut self,
        caller: &User,
        conversation_id: ConversationId,
        body: String,
        file: Option<FileAttachment>,
    ) -> Result<MessageId> {
        let now = self.now();
        let tx = self.transaction()?;

        let conversation = require_member(&tx, conversation_id, caller.id)?;

        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id: caller.id,
            body,
            file,
            created_at: now,
            deleted_at: None,
        };
        insert_message(&tx, &message)?;
        conversations::touch(&tx, conversation_id, message.id, now)?;
        unread::record_message(&tx, &conversation, caller.id, now)?;
        typing::clear(&tx, conversation_id, caller.id)?;

        tx.commit()?;

        tracing::debug!(
            conversation = %conversation_id,
            message = %message.id,
            sender = %caller.id,
            has_file = message.file.is_some(),
            "message sent"
        );
        Ok(message.id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Mark a message deleted. Only its sender may do this; the content stays
    /// in storage but readers see a tombstone.
    pub fn soft_delete_message(&mut self, caller: &User, message_id: MessageId) -> Result<()> {
        let now = self.now();
        let tx = self.transaction()?;

        let message = load_message(&tx, message_id)?.ok_or(StoreError::MessageNotFound)?;
        if message.sender_id != caller.id {
            return Err(StoreError::NotOwner);
        }

        tx.execute(
            "UPDATE messages SET deleted_at = COALESCE(deleted_at, ?1) WHERE id = ?2",
            params![ts(&now), message_id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(message = %message_id, "message soft-deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Raw stored message, including hidden content of deleted messages.
    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        load_message(self.conn(), id)?.ok_or(StoreError::MessageNotFound)
    }

    /// Raw stored messages of a conversation in creation order.
    pub fn messages_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    let file = message.file.as_ref();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, body, file_ref, file_name,
                               file_type, file_size, created_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)",
        params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_id.to_string(),
            message.body,
            file.map(|f| f.storage_ref.as_str()),
            file.map(|f| f.file_name.as_str()),
            file.map(|f| f.file_type.as_str()),
            file.map(|f| f.file_size),
            ts(&message.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn load_message(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    let message = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            params![id.to_string()],
            row_to_message,
        )
        .optional()?;
    Ok(message)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let file_ref: Option<String> = row.get(4)?;
    let file = match file_ref {
        Some(storage_ref) => Some(FileAttachment {
            storage_ref,
            file_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            file_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            file_size: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        }),
        None => None,
    };
    let created_at: DateTime<Utc> = get_ts(row, 8)?;

    Ok(Message {
        id: get_id(row, 0)?,
        conversation_id: get_id(row, 1)?,
        sender_id: get_id(row, 2)?,
        body: row.get(3)?,
        file,
        created_at,
        deleted_at: get_opt_ts(row, 9)?,
    })
}
