//! Storage for [`TopicShare`] records.
//!
//! Shares are never deleted by the sharing workflow: revoke, leave, and the
//! relationship-removal cascade all clear `is_active`. Granting again
//! reactivates the same row through an upsert on the `(topic_id, peer_id)`
//! unique index, so there is at most one row per pair even under concurrent
//! grants.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use studyhub_shared::{PermissionLevel, ShareId, TopicId, UserId, UserPair};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Topic, TopicShare, TopicShareView, UserSummary};
use crate::row;
use crate::topics::topic_at;
use crate::users::summary_at;

const SHARE_COLUMNS: &str = "id, topic_id, owner_id, peer_id, permission_level, shared_at, is_active";

impl Database {
    /// Grant `peer` read access to `topic_id`, reactivating an earlier grant
    /// if one exists.
    ///
    /// The owner column is copied from the topic row inside the same
    /// statement, so `owner_id` always equals the topic's owner. Returns the
    /// share and whether a new row was created.
    pub fn upsert_share(
        &self,
        topic_id: TopicId,
        peer: UserId,
        permission: PermissionLevel,
        now: DateTime<Utc>,
    ) -> Result<(TopicShare, bool)> {
        let candidate = ShareId::new();

        let share = self
            .conn()
            .query_row(
                &format!(
                    "INSERT INTO topic_shares
                         (id, topic_id, owner_id, peer_id, permission_level, shared_at, is_active)
                     SELECT ?1, t.id, t.owner_id, ?3, ?4, ?5, 1
                     FROM topics t
                     WHERE t.id = ?2
                     ON CONFLICT (topic_id, peer_id) DO UPDATE SET is_active = 1
                     RETURNING {SHARE_COLUMNS}"
                ),
                params![
                    candidate.to_string(),
                    topic_id.to_string(),
                    peer.to_string(),
                    permission.as_str(),
                    row::ts(&now),
                ],
                row_to_share,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::from_write(other, "share"),
            })?;

        let created = share.id == candidate;
        Ok((share, created))
    }

    /// The active share of `topic_id` naming `peer`, if any.
    pub fn active_share(&self, topic_id: TopicId, peer: UserId) -> Result<Option<TopicShare>> {
        let share = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {SHARE_COLUMNS} FROM topic_shares
                     WHERE topic_id = ?1 AND peer_id = ?2 AND is_active = 1"
                ),
                params![topic_id.to_string(), peer.to_string()],
                row_to_share,
            )
            .optional()?;
        Ok(share)
    }

    /// Clear the active share of `topic_id` naming `peer`.  Returns `false`
    /// when there was no active share.
    pub fn deactivate_share(&self, topic_id: TopicId, peer: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE topic_shares SET is_active = 0
             WHERE topic_id = ?1 AND peer_id = ?2 AND is_active = 1",
            params![topic_id.to_string(), peer.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Active shares of a topic with each peer's identity, newest first.
    pub fn list_active_shares_for_topic(&self, topic_id: TopicId) -> Result<Vec<TopicShareView>> {
        let mut stmt = self.conn().prepare(
            "SELECT s.id, s.topic_id, u.id, u.username, s.permission_level, s.shared_at,
                    s.is_active
             FROM topic_shares s
             JOIN users u ON u.id = s.peer_id
             WHERE s.topic_id = ?1 AND s.is_active = 1
             ORDER BY s.shared_at DESC, s.rowid DESC",
        )?;

        let rows = stmt.query_map(params![topic_id.to_string()], |row| {
            Ok(TopicShareView {
                id: ShareId(row::uuid_at(row, 0)?),
                topic_id: TopicId(row::uuid_at(row, 1)?),
                peer: summary_at(row, 2)?,
                permission_level: row::enum_at(row, 4, PermissionLevel::parse)?,
                shared_at: row::ts_at(row, 5)?,
                is_active: row.get(6)?,
            })
        })?;

        let mut shares = Vec::new();
        for row in rows {
            shares.push(row?);
        }
        Ok(shares)
    }

    /// Topics actively shared with `peer`, each with its owner's identity.
    pub fn list_topics_shared_with(&self, peer: UserId) -> Result<Vec<(Topic, UserSummary)>> {
        let mut stmt = self.conn().prepare(
            "SELECT t.id, t.owner_id, t.name, t.collapsed, t.created_at, t.updated_at,
                    o.id, o.username
             FROM topic_shares s
             JOIN topics t ON t.id = s.topic_id
             JOIN users o ON o.id = t.owner_id
             WHERE s.peer_id = ?1 AND s.is_active = 1
             ORDER BY s.shared_at DESC, s.rowid DESC",
        )?;

        let rows = stmt.query_map(params![peer.to_string()], |row| {
            Ok((topic_at(row, 0)?, summary_at(row, 6)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

/// Deactivate every active share between the two users of `pair`, whichever
/// of them owns the topic.  Runs on the caller's connection or transaction.
pub(crate) fn deactivate_between(conn: &Connection, pair: UserPair) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE topic_shares SET is_active = 0
         WHERE is_active = 1
           AND ((owner_id = ?1 AND peer_id = ?2) OR (owner_id = ?2 AND peer_id = ?1))",
        params![pair.low().to_string(), pair.high().to_string()],
    )?;
    Ok(affected)
}

fn row_to_share(row: &rusqlite::Row<'_>) -> rusqlite::Result<TopicShare> {
    Ok(TopicShare {
        id: ShareId(row::uuid_at(row, 0)?),
        topic_id: TopicId(row::uuid_at(row, 1)?),
        owner_id: UserId(row::uuid_at(row, 2)?),
        peer_id: UserId(row::uuid_at(row, 3)?),
        permission_level: row::enum_at(row, 4, PermissionLevel::parse)?,
        shared_at: row::ts_at(row, 5)?,
        is_active: row.get(6)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::peers::tests::relationship;
    use crate::topics::tests::topic;
    use crate::users::tests::user;
    use studyhub_shared::PeerStatus;

    pub(crate) fn share_count(db: &Database, topic_id: TopicId, peer: UserId) -> i64 {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM topic_shares WHERE topic_id = ?1 AND peer_id = ?2",
                params![topic_id.to_string(), peer.to_string()],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn regrant_reactivates_same_row() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let t = topic(&db, a.id, "Rust");
        let now = Utc::now();

        let (first, created) = db
            .upsert_share(t.id, b.id, PermissionLevel::ReadOnly, now)
            .unwrap();
        assert!(created);
        assert_eq!(first.owner_id, a.id);

        assert!(db.deactivate_share(t.id, b.id).unwrap());
        assert!(!db.deactivate_share(t.id, b.id).unwrap());
        assert!(db.active_share(t.id, b.id).unwrap().is_none());

        let (second, created) = db
            .upsert_share(t.id, b.id, PermissionLevel::ReadOnly, now)
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert!(second.is_active);
        assert_eq!(share_count(&db, t.id, b.id), 1);
    }

    #[test]
    fn share_of_missing_topic_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let b = user(&db, "bob");
        let res = db.upsert_share(TopicId::new(), b.id, PermissionLevel::ReadOnly, Utc::now());
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[test]
    fn owner_cannot_be_peer() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let t = topic(&db, a.id, "Rust");
        assert!(db
            .upsert_share(t.id, a.id, PermissionLevel::ReadOnly, Utc::now())
            .is_err());
    }

    #[test]
    fn relationship_removal_cascades_both_directions() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        let rel = relationship(&db, a.id, b.id, PeerStatus::Accepted);
        let ta = topic(&db, a.id, "A's");
        let tb = topic(&db, b.id, "B's");
        let tc = topic(&db, a.id, "for carol");
        let now = Utc::now();

        db.upsert_share(ta.id, b.id, PermissionLevel::ReadOnly, now).unwrap();
        db.upsert_share(tb.id, a.id, PermissionLevel::ReadOnly, now).unwrap();
        db.upsert_share(tc.id, c.id, PermissionLevel::ReadOnly, now).unwrap();

        assert_eq!(db.remove_relationship(&rel).unwrap(), 2);

        assert!(db.active_share(ta.id, b.id).unwrap().is_none());
        assert!(db.active_share(tb.id, a.id).unwrap().is_none());
        assert!(db.active_share(tc.id, c.id).unwrap().is_some());
        // rows are kept, only deactivated
        assert_eq!(share_count(&db, ta.id, b.id), 1);
    }

    #[test]
    fn shared_with_lists_owner() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let t = topic(&db, a.id, "Rust");
        db.upsert_share(t.id, b.id, PermissionLevel::ReadOnly, Utc::now())
            .unwrap();

        let shared = db.list_topics_shared_with(b.id).unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].0.id, t.id);
        assert_eq!(shared[0].1.username, "alice");

        let views = db.list_active_shares_for_topic(t.id).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].peer.username, "bob");
    }
}
