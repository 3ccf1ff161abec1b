use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Append-only audit trail of peers viewing shared content
CREATE TABLE IF NOT EXISTS share_accesses (
    id          TEXT PRIMARY KEY NOT NULL,
    share_id    TEXT NOT NULL,             -- FK -> topic_shares(id)
    accessed_at TEXT NOT NULL,             -- RFC-3339, UTC
    access_type TEXT NOT NULL CHECK (access_type IN ('view_topic', 'view_card')),

    FOREIGN KEY (share_id) REFERENCES topic_shares(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_share_accesses_share
    ON share_accesses(share_id, accessed_at DESC);

-- Audit rows are never rewritten
CREATE TRIGGER IF NOT EXISTS share_accesses_no_update
BEFORE UPDATE ON share_accesses
BEGIN
    SELECT RAISE(ABORT, 'share_accesses is append-only');
END;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
