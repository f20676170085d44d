use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Presence: freshest online/last-seen per user, supersedes users.is_online
CREATE TABLE IF NOT EXISTS presence (
    user_id    TEXT PRIMARY KEY NOT NULL,
    is_online  INTEGER NOT NULL,
    last_seen  TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- Typing indicators; rows past expires_at are ignored by readers
CREATE TABLE IF NOT EXISTS typing_indicators (
    conversation_id TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL,

    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

-- Emoji reactions; the primary key makes toggling insert-or-delete
CREATE TABLE IF NOT EXISTS message_reactions (
    message_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    emoji      TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (message_id, user_id, emoji),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
