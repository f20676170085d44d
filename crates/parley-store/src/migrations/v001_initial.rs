//! v001 -- Initial schema creation.
//!
//! Creates users, conversations with their member sets, messages and the
//! per-member unread counters.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (one row per identity-provider subject)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    subject    TEXT NOT NULL UNIQUE,        -- identity provider subject id
    name       TEXT NOT NULL,
    email      TEXT NOT NULL,
    avatar_url TEXT,
    is_online  INTEGER NOT NULL DEFAULT 0,  -- coarse flag, see presence
    last_seen  TEXT NOT NULL,               -- RFC-3339
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    is_group        INTEGER NOT NULL,           -- boolean 0/1
    title           TEXT,                       -- set iff is_group
    direct_key      TEXT UNIQUE,                -- "<low id>:<high id>", direct only
    last_message_id TEXT,                       -- pointer into messages(id)
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    CHECK ((is_group = 1 AND title IS NOT NULL AND direct_key IS NULL)
        OR (is_group = 0 AND title IS NULL AND direct_key IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS conversation_members (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    position        INTEGER NOT NULL,           -- creator first

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_members_user ON conversation_members(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    body            TEXT NOT NULL,              -- empty for file-only messages
    file_ref        TEXT,                       -- object storage reference
    file_name       TEXT,
    file_type       TEXT,
    file_size       INTEGER,
    created_at      TEXT NOT NULL,
    deleted_at      TEXT,                       -- soft delete tombstone

    CHECK (body <> '' OR file_ref IS NOT NULL),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages(conversation_id, created_at);

-- ----------------------------------------------------------------
-- Unread counters (one row per membership)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS unread_counts (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    count           INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
    updated_at      TEXT NOT NULL,

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_unread_user ON unread_counts(user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
