//! Presence tracker.
//!
//! Clients report visibility changes, a ~30s heartbeat and a best-effort
//! "going offline" on teardown. The presence row is the source of truth for
//! online/last-seen once it exists; the coarse flag on the user row is the
//! fallback.

use chrono::{DateTime, Utc};
use parley_shared::UserId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::models::{Presence, User};
use crate::sql::{get_id, get_ts, ts};

impl Database {
    /// Record the caller's online flag and mirror it onto the user row.
    pub fn set_online_status(&mut self, caller: &User, is_online: bool) -> Result<()> {
        let now = self.now();
        let tx = self.transaction()?;

        tx.execute(
            "UPDATE users SET is_online = ?1, last_seen = ?2 WHERE id = ?3",
            params![is_online as i32, ts(&now), caller.id.to_string()],
        )?;
        upsert_presence(&tx, caller.id, is_online, now)?;

        tx.commit()?;

        tracing::debug!(user = %caller.id, is_online, "presence updated");
        Ok(())
    }

    pub fn get_presence(&self, user_id: UserId) -> Result<Option<Presence>> {
        let presence = self
            .conn()
            .query_row(
                "SELECT user_id, is_online, last_seen, updated_at FROM presence WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    let is_online: i32 = row.get(1)?;
                    Ok(Presence {
                        user_id: get_id(row, 0)?,
                        is_online: is_online != 0,
                        last_seen: get_ts(row, 2)?,
                        updated_at: get_ts(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(presence)
    }

    /// Online flag and last-seen time to show for `user`.
    ///
    /// Prefers the presence row over the user row. An "online" report older
    /// than the configured staleness window is shown as offline, since the
    /// teardown signal may never have arrived.
    pub fn effective_presence(&self, user: &User) -> Result<(bool, DateTime<Utc>)> {
        let (is_online, last_seen, updated_at) = match self.get_presence(user.id)? {
            Some(p) => (p.is_online, p.last_seen, p.updated_at),
            None => (user.is_online, user.last_seen, user.last_seen),
        };

        let stale = match self.presence_stale_after() {
            Some(window) => self.now() - updated_at > window,
            None => false,
        };

        Ok((is_online && !stale, last_seen))
    }
}

/// At most one presence row per user.
pub(crate) fn upsert_presence(
    conn: &Connection,
    user_id: UserId,
    is_online: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO presence (user_id, is_online, last_seen, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
             is_online = excluded.is_online,
             last_seen = excluded.last_seen,
             updated_at = excluded.updated_at",
        params![user_id.to_string(), is_online as i32, ts(&now)],
    )?;
    Ok(())
}
