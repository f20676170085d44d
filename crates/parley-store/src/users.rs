//! User profiles and the identity resolver.
//!
//! Every other operation starts with [`Database::resolve_caller`], which maps
//! a verified identity-provider subject to its application profile and fails
//! closed when either is missing.

use parley_shared::constants::DEFAULT_DISPLAY_NAME;
use parley_shared::UserId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AuthState, ProfileSync, User};
use crate::sql::{get_id, get_ts, ts};

pub(crate) const USER_COLUMNS: &str =
    "id, subject, name, email, avatar_url, is_online, last_seen, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Identity resolver
    // ------------------------------------------------------------------

    /// Resolve the application user for a verified subject.
    ///
    /// `None` means the request carried no verified identity.
    pub fn resolve_caller(&self, subject: Option<&str>) -> Result<User> {
        let subject = subject.ok_or(StoreError::Unauthenticated)?;
        self.find_user_by_subject(subject)?
            .ok_or(StoreError::ProfileNotSynced)
    }

    /// Never fails on missing identity; reports what the client still has to do.
    pub fn auth_state(&self, subject: Option<&str>) -> Result<AuthState> {
        let Some(subject) = subject else {
            return Ok(AuthState {
                is_authenticated: false,
                has_profile: false,
            });
        };

        Ok(AuthState {
            is_authenticated: true,
            has_profile: self.find_user_by_subject(subject)?.is_some(),
        })
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Create or refresh the profile for `profile.subject`.
    ///
    /// Profile fields are overwritten (most recent sync wins) and the user is
    /// marked online, both on the user row and in presence.
    pub fn sync_user(&mut self, profile: &ProfileSync) -> Result<UserId> {
        let now = self.now();
        let name = match profile.name.trim() {
            "" => DEFAULT_DISPLAY_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };

        let tx = self.transaction()?;

        let existing: Option<UserId> = tx
            .query_row(
                "SELECT id FROM users WHERE subject = ?1",
                params![profile.subject],
                |row| get_id(row, 0),
            )
            .optional()?;

        let user_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE users
                     SET name = ?1, email = ?2, avatar_url = ?3, is_online = 1, last_seen = ?4
                     WHERE id = ?5",
                    params![name, profile.email, profile.avatar_url, ts(&now), id.to_string()],
                )?;
                id
            }
            None => {
                let id = UserId::new();
                tx.execute(
                    "INSERT INTO users (id, subject, name, email, avatar_url, is_online, last_seen, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                    params![
                        id.to_string(),
                        profile.subject,
                        name,
                        profile.email,
                        profile.avatar_url,
                        ts(&now),
                    ],
                )?;
                tracing::info!(user = %id, "created user profile");
                id
            }
        };

        crate::presence::upsert_presence(&tx, user_id, true, now)?;
        tx.commit()?;

        Ok(user_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn find_user_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE subject = ?1"),
                params![subject],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        load_user(self.conn(), id)?.ok_or(StoreError::UserNotFound)
    }

    /// All users, ordered by name.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name ASC"))?;

        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn load_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

/// Map a `rusqlite::Row` selected with [`USER_COLUMNS`] to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let is_online: i32 = row.get(5)?;

    Ok(User {
        id: get_id(row, 0)?,
        subject: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        avatar_url: row.get(4)?,
        is_online: is_online != 0,
        last_seen: get_ts(row, 6)?,
        created_at: get_ts(row, 7)?,
    })
}
