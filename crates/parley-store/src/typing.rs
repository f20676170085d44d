//! Typing registry.
//!
//! One row per (conversation, user) with an expiry two seconds after the
//! last `set_typing(true)`. Nothing sweeps expired rows: readers compare
//! `expires_at` with the current time and skip what has lapsed.

use chrono::{DateTime, Duration, Utc};
use parley_shared::constants::TYPING_TTL_MS;
use parley_shared::{ConversationId, UserId};
use rusqlite::{params, Connection};

use crate::conversations::load_conversation;
use crate::database::Database;
use crate::error::Result;
use crate::models::{TypingIndicator, User};
use crate::sql::{get_id, get_ts, ts};

impl Database {
    /// Start (or refresh) or stop the caller's typing indicator.
    ///
    /// Silently does nothing if the caller is not a member.
    pub fn set_typing(
        &mut self,
        caller: &User,
        conversation_id: ConversationId,
        is_typing: bool,
    ) -> Result<()> {
        let now = self.now();
        let tx = self.transaction()?;

        match load_conversation(&tx, conversation_id)? {
            Some(conversation) if conversation.is_member(caller.id) => {}
            _ => return Ok(()),
        }

        if is_typing {
            let expires_at = now + Duration::milliseconds(TYPING_TTL_MS);
            tx.execute(
                "INSERT INTO typing_indicators (conversation_id, user_id, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(conversation_id, user_id) DO UPDATE SET
                     updated_at = excluded.updated_at,
                     expires_at = excluded.expires_at",
                params![
                    conversation_id.to_string(),
                    caller.id.to_string(),
                    ts(&now),
                    ts(&expires_at),
                ],
            )?;
        } else {
            clear(&tx, conversation_id, caller.id)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Display names of members other than the caller who are typing now.
    /// Non-members get an empty list.
    pub fn typing_users(
        &self,
        caller: &User,
        conversation_id: ConversationId,
    ) -> Result<Vec<String>> {
        match load_conversation(self.conn(), conversation_id)? {
            Some(conversation) if conversation.is_member(caller.id) => {
                self.active_typists(conversation_id, caller.id, self.now())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Names of users with an unexpired indicator, excluding `viewer`.
    pub(crate) fn active_typists(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT t.conversation_id, t.user_id, t.updated_at, t.expires_at, u.name
             FROM typing_indicators t
             JOIN users u ON u.id = t.user_id
             WHERE t.conversation_id = ?1
             ORDER BY t.updated_at ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id.to_string()], |row| {
            let indicator = TypingIndicator {
                conversation_id: get_id(row, 0)?,
                user_id: get_id(row, 1)?,
                updated_at: get_ts(row, 2)?,
                expires_at: get_ts(row, 3)?,
            };
            let name: String = row.get(4)?;
            Ok((indicator, name))
        })?;

        let mut names = Vec::new();
        for row in rows {
            let (indicator, name) = row?;
            if indicator.user_id != viewer && indicator.is_active(now) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Drop the indicator for (conversation, user), if any.
pub(crate) fn clear(conn: &Connection, conversation_id: ConversationId, user: UserId) -> Result<()> {
    conn.execute(
        "DELETE FROM typing_indicators WHERE conversation_id = ?1 AND user_id = ?2",
        params![conversation_id.to_string(), user.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::models::ProfileSync;

    fn user(db: &mut Database, subject: &str, name: &str) -> User {
        let id = db
            .sync_user(&ProfileSync {
                subject: subject.into(),
                name: name.into(),
                email: format!("{subject}@example.com"),
                avatar_url: None,
            })
            .unwrap();
        db.get_user(id).unwrap()
    }

    fn setup() -> (Database, Clock, User, User, ConversationId) {
        let clock = Clock::system();
        let mut db = Database::open_in_memory().unwrap().with_clock(clock.clone());
        let a = user(&mut db, "a", "Alice");
        let b = user(&mut db, "b", "Bob");
        let id = db.start_or_create_direct(&a, b.id).unwrap();
        (db, clock, a, b, id)
    }

    #[test]
    fn typing_visible_to_others_only() {
        let (mut db, _clock, a, b, id) = setup();

        db.set_typing(&a, id, true).unwrap();

        assert_eq!(db.typing_users(&b, id).unwrap(), vec!["Alice".to_string()]);
        assert!(db.typing_users(&a, id).unwrap().is_empty());
    }

    #[test]
    fn expires_after_two_seconds() {
        let (mut db, clock, a, b, id) = setup();

        db.set_typing(&a, id, true).unwrap();
        clock.advance(Duration::milliseconds(1_900));
        assert_eq!(db.typing_users(&b, id).unwrap().len(), 1);

        clock.advance(Duration::milliseconds(200));
        assert!(db.typing_users(&b, id).unwrap().is_empty());

        // The row lingers until overwritten or cleared.
        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM typing_indicators", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn refresh_extends_instead_of_stacking() {
        let (mut db, clock, a, b, id) = setup();

        db.set_typing(&a, id, true).unwrap();
        clock.advance(Duration::milliseconds(1_500));
        db.set_typing(&a, id, true).unwrap();
        clock.advance(Duration::milliseconds(1_500));

        assert_eq!(db.typing_users(&b, id).unwrap(), vec!["Alice".to_string()]);
    }

    #[test]
    fn stop_and_send_clear_indicator() {
        let (mut db, _clock, a, b, id) = setup();

        db.set_typing(&a, id, true).unwrap();
        db.set_typing(&a, id, false).unwrap();
        assert!(db.typing_users(&b, id).unwrap().is_empty());

        db.set_typing(&a, id, true).unwrap();
        db.send_message(&a, id, "done typing").unwrap();
        assert!(db.typing_users(&b, id).unwrap().is_empty());
    }

    #[test]
    fn non_members_are_ignored() {
        let (mut db, _clock, a, _b, id) = setup();
        let outsider = user(&mut db, "c", "Carol");

        db.set_typing(&outsider, id, true).unwrap();

        assert!(db.typing_users(&a, id).unwrap().is_empty());
        assert!(db.typing_users(&outsider, id).unwrap().is_empty());
    }
}
