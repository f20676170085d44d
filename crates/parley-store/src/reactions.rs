//! Message reactions.
//!
//! A reaction is one (message, user, emoji) row. Toggling deletes the row if
//! it exists and inserts it otherwise, so two toggles cancel out. Readers get
//! per-emoji summaries with a count and whether the viewer is among them.

use std::collections::{BTreeMap, HashMap};

use parley_shared::constants::is_allowed_reaction;
use parley_shared::{ConversationId, MessageId, UserId};
use rusqlite::params;
use serde::Serialize;

use crate::conversations::require_member;
use crate::database::Database;
use crate::error::{Result, StoreError, ValidationError};
use crate::messages::load_message;
use crate::models::{Reaction, ReactionToggle, User};
use crate::sql::{get_id, get_ts, ts};

/// Reactions for one emoji on one message, from a viewer's perspective.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: u32,
    pub reacted_by_me: bool,
}

impl Database {
    /// React with `emoji` if the caller has not, otherwise take it back.
    pub fn toggle_reaction(
        &mut self,
        caller: &User,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<ReactionToggle> {
        if !is_allowed_reaction(emoji) {
            return Err(ValidationError::UnsupportedReaction.into());
        }

        let now = self.now();
        let tx = self.transaction()?;

        let message = load_message(&tx, message_id)?.ok_or(StoreError::MessageNotFound)?;
        require_member(&tx, message.conversation_id, caller.id)?;

        let removed = tx.execute(
            "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
            params![message_id.to_string(), caller.id.to_string(), emoji],
        )?;

        let outcome = if removed > 0 {
            ReactionToggle::Removed
        } else {
            tx.execute(
                "INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id.to_string(), caller.id.to_string(), emoji, ts(&now)],
            )?;
            ReactionToggle::Added
        };

        tx.commit()?;

        tracing::debug!(message = %message_id, user = %caller.id, ?outcome, "reaction toggled");
        Ok(outcome)
    }

    pub fn get_reactions_for_message(&self, message_id: MessageId) -> Result<Vec<Reaction>> {
        let mut stmt = self.conn().prepare(
            "SELECT message_id, user_id, emoji, created_at
             FROM message_reactions WHERE message_id = ?1 ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![message_id.to_string()], row_to_reaction)?;

        let mut reactions = Vec::new();
        for row in rows {
            reactions.push(row?);
        }
        Ok(reactions)
    }

    /// Reactions on every message of a conversation, keyed by message.
    pub fn reactions_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<HashMap<MessageId, Vec<Reaction>>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.message_id, r.user_id, r.emoji, r.created_at
             FROM message_reactions r
             JOIN messages m ON m.id = r.message_id
             WHERE m.conversation_id = ?1
             ORDER BY r.created_at ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_reaction)?;

        let mut map: HashMap<MessageId, Vec<Reaction>> = HashMap::new();
        for row in rows {
            let reaction = row?;
            map.entry(reaction.message_id).or_default().push(reaction);
        }
        Ok(map)
    }
}

/// Group reactions by emoji, sorted by emoji for stable rendering.
pub fn summarize_reactions(reactions: &[Reaction], viewer: UserId) -> Vec<ReactionSummary> {
    let mut groups: BTreeMap<&str, ReactionSummary> = BTreeMap::new();

    for reaction in reactions {
        let group = groups
            .entry(reaction.emoji.as_str())
            .or_insert_with(|| ReactionSummary {
                emoji: reaction.emoji.clone(),
                count: 0,
                reacted_by_me: false,
            });
        group.count += 1;
        group.reacted_by_me |= reaction.user_id == viewer;
    }

    groups.into_values().collect()
}

fn row_to_reaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reaction> {
    Ok(Reaction {
        message_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        emoji: row.get(2)?,
        created_at: get_ts(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileSync;

    fn user(db: &mut Database, subject: &str) -> User {
        let id = db
            .sync_user(&ProfileSync {
                subject: subject.into(),
                name: subject.into(),
                email: format!("{subject}@example.com"),
                avatar_url: None,
            })
            .unwrap();
        db.get_user(id).unwrap()
    }

    #[test]
    fn toggle_twice_is_a_no_op() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        let id = db.start_or_create_direct(&a, b.id).unwrap();
        let message = db.send_message(&a, id, "hello").unwrap();

        assert_eq!(db.toggle_reaction(&b, message, "🔥").unwrap(), ReactionToggle::Added);
        assert_eq!(db.get_reactions_for_message(message).unwrap().len(), 1);

        assert_eq!(db.toggle_reaction(&b, message, "🔥").unwrap(), ReactionToggle::Removed);
        assert!(db.get_reactions_for_message(message).unwrap().is_empty());
    }

    #[test]
    fn unsupported_emoji_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        let id = db.start_or_create_direct(&a, b.id).unwrap();
        let message = db.send_message(&a, id, "hello").unwrap();

        let err = db.toggle_reaction(&b, message, "🦀").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::UnsupportedReaction)
        ));
    }

    #[test]
    fn outsiders_cannot_react() {
        let mut db = Database::open_in_memory().unwrap();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        let outsider = user(&mut db, "outsider");
        let id = db.start_or_create_direct(&a, b.id).unwrap();
        let message = db.send_message(&a, id, "hello").unwrap();

        let err = db.toggle_reaction(&outsider, message, "👍").unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound));

        let err = db.toggle_reaction(&a, MessageId::new(), "👍").unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound));
    }

    #[test]
    fn summary_groups_and_sorts() {
        let a = UserId::new();
        let b = UserId::new();
        let message_id = MessageId::new();
        let now = chrono::Utc::now();
        let reaction = |user_id, emoji: &str| Reaction {
            message_id,
            user_id,
            emoji: emoji.into(),
            created_at: now,
        };

        let summary = summarize_reactions(
            &[reaction(a, "😂"), reaction(b, "👍"), reaction(a, "👍")],
            b,
        );

        let emojis: Vec<&str> = summary.iter().map(|s| s.emoji.as_str()).collect();
        let mut sorted = emojis.clone();
        sorted.sort();
        assert_eq!(emojis, sorted);

        let thumbs = summary.iter().find(|s| s.emoji == "👍").unwrap();
        assert_eq!(thumbs.count, 2);
        assert!(thumbs.reacted_by_me);
        let laugh = summary.iter().find(|s| s.emoji == "😂").unwrap();
        assert_eq!(laugh.count, 1);
        assert!(!laugh.reacted_by_me);
    }
}
