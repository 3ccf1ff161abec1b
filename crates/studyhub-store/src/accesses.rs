//! Append-only audit trail of peers viewing shared content.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use studyhub_shared::{AccessId, AccessType, ShareId, TopicId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ShareAccess, ShareAccessView};
use crate::row;
use crate::users::summary_at;

impl Database {
    /// Append an access row against the active share of `topic_id` naming
    /// `peer`.
    ///
    /// The share check and the insert are a single statement: if no active
    /// share matches, nothing is written and `None` is returned.
    pub fn record_access(
        &self,
        topic_id: TopicId,
        peer: UserId,
        access_type: AccessType,
        now: DateTime<Utc>,
    ) -> Result<Option<ShareAccess>> {
        let access = self
            .conn()
            .query_row(
                "INSERT INTO share_accesses (id, share_id, accessed_at, access_type)
                 SELECT ?1, s.id, ?2, ?3
                 FROM topic_shares s
                 WHERE s.topic_id = ?4 AND s.peer_id = ?5 AND s.is_active = 1
                 RETURNING id, share_id, accessed_at, access_type",
                params![
                    AccessId::new().to_string(),
                    row::ts(&now),
                    access_type.as_str(),
                    topic_id.to_string(),
                    peer.to_string(),
                ],
                row_to_access,
            )
            .optional()?;
        Ok(access)
    }

    /// Audit trail for every share of `topic_id`, newest first.
    pub fn list_accesses_for_topic(&self, topic_id: TopicId) -> Result<Vec<ShareAccessView>> {
        let mut stmt = self.conn().prepare(
            "SELECT a.id, a.share_id, u.id, u.username, a.accessed_at, a.access_type
             FROM share_accesses a
             JOIN topic_shares s ON s.id = a.share_id
             JOIN users u ON u.id = s.peer_id
             WHERE s.topic_id = ?1
             ORDER BY a.accessed_at DESC, a.rowid DESC",
        )?;

        let rows = stmt.query_map(params![topic_id.to_string()], |row| {
            Ok(ShareAccessView {
                id: AccessId(row::uuid_at(row, 0)?),
                share_id: ShareId(row::uuid_at(row, 1)?),
                peer: summary_at(row, 2)?,
                accessed_at: row::ts_at(row, 4)?,
                access_type: row::enum_at(row, 5, AccessType::parse)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_accesses(&self, share_id: ShareId) -> Result<i64> {
        let n = self.conn().query_row(
            "SELECT COUNT(*) FROM share_accesses WHERE share_id = ?1",
            params![share_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn row_to_access(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareAccess> {
    Ok(ShareAccess {
        id: AccessId(row::uuid_at(row, 0)?),
        share_id: ShareId(row::uuid_at(row, 1)?),
        accessed_at: row::ts_at(row, 2)?,
        access_type: row::enum_at(row, 3, AccessType::parse)?,
    })
}
