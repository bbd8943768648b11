//! v001 -- Initial schema creation.
//!
//! Creates `chats`, `messages` and `reactions`. Messages carry no foreign key
//! to `chats`: writes are mirrored best-effort from concurrent tasks and a
//! message row may land before its chat row.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id              TEXT PRIMARY KEY NOT NULL,   -- network chat identifier
    name            TEXT NOT NULL,
    profile_picture TEXT,
    updated_at      TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Messages (rowid order = arrival order)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id             TEXT PRIMARY KEY NOT NULL,
    chat_id        TEXT NOT NULL,
    sender         TEXT NOT NULL,
    sender_name    TEXT NOT NULL,
    content        TEXT NOT NULL,
    timestamp      TEXT NOT NULL,                -- RFC-3339
    from_me        INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    has_media      INTEGER NOT NULL DEFAULT 0,
    media_path     TEXT,
    edited         INTEGER NOT NULL DEFAULT 0,
    deleted        INTEGER NOT NULL DEFAULT 0,
    quoted_id      TEXT,
    quoted_sender  TEXT,
    quoted_content TEXT,
    protocol_code  INTEGER,
    protocol_name  TEXT
);

CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);

-- ----------------------------------------------------------------
-- Reactions (one per message and sender)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reactions (
    message_id  TEXT NOT NULL,
    sender      TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    emoji       TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    position    INTEGER NOT NULL,

    PRIMARY KEY (message_id, sender),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
