//! v002 -- Peer relationships and topic shares.
//!
//! `peer_relationships` stores the unordered pair twice: as the directed
//! `(requester_id, addressee_id)` and as the canonical `(user_low, user_high)`.
//! The unique index on the canonical columns is what rejects a second
//! relationship between two users, whichever side asks first.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS peer_relationships (
    id           TEXT PRIMARY KEY NOT NULL,
    requester_id TEXT NOT NULL,
    addressee_id TEXT NOT NULL,
    user_low     TEXT NOT NULL,
    user_high    TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'pending'
                 CHECK (status IN ('pending', 'accepted', 'rejected', 'blocked')),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,

    CHECK (requester_id <> addressee_id),
    CHECK (user_low = min(requester_id, addressee_id)),
    CHECK (user_high = max(requester_id, addressee_id)),

    FOREIGN KEY (requester_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (addressee_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_peer_pair
    ON peer_relationships(user_low, user_high);
CREATE INDEX IF NOT EXISTS idx_peer_addressee
    ON peer_relationships(addressee_id, status);
CREATE INDEX IF NOT EXISTS idx_peer_requester
    ON peer_relationships(requester_id, status);

CREATE TABLE IF NOT EXISTS topic_shares (
    id               TEXT PRIMARY KEY NOT NULL,
    topic_id         TEXT NOT NULL,
    owner_id         TEXT NOT NULL,
    peer_id          TEXT NOT NULL,
    permission_level TEXT NOT NULL DEFAULT 'read_only'
                     CHECK (permission_level IN ('read_only')),
    shared_at        TEXT NOT NULL,
    is_active        INTEGER NOT NULL DEFAULT 1,

    CHECK (owner_id <> peer_id),

    FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (peer_id)  REFERENCES users(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_share_topic_peer
    ON topic_shares(topic_id, peer_id);
CREATE INDEX IF NOT EXISTS idx_share_peer_active
    ON topic_shares(peer_id, is_active);
CREATE INDEX IF NOT EXISTS idx_share_owner_peer
    ON topic_shares(owner_id, peer_id);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
