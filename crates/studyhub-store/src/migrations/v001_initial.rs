//! v001 -- Initial schema creation.
//!
//! Creates the identity tables (`users`, `sessions`) and the owner-scoped
//! content tables (`topics`, `cards`).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,         -- UUID v4
    username      TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email         TEXT,
    password_hash TEXT NOT NULL,                     -- Argon2 PHC string
    date_joined   TEXT NOT NULL                      -- RFC-3339, UTC
);

-- ----------------------------------------------------------------
-- Sessions (bearer tokens, stored as BLAKE3 digests)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY NOT NULL,
    user_id      TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

-- ----------------------------------------------------------------
-- Topics
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS topics (
    id         TEXT PRIMARY KEY NOT NULL,
    owner_id   TEXT NOT NULL,
    name       TEXT NOT NULL,
    collapsed  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_topics_owner ON topics(owner_id, created_at DESC);

-- ----------------------------------------------------------------
-- Cards
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cards (
    id         TEXT PRIMARY KEY NOT NULL,
    topic_id   TEXT NOT NULL,
    name       TEXT NOT NULL,
    resource   TEXT NOT NULL DEFAULT '',
    note       TEXT NOT NULL DEFAULT '',
    progress   INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
    starred    INTEGER NOT NULL DEFAULT 0,
    collapsed  INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cards_topic ON cards(topic_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
