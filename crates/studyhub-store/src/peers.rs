//! Storage for [`PeerRelationship`] records.
//!
//! A relationship row carries both the directed `(requester, addressee)` pair
//! and the canonical `(user_low, user_high)` pair from [`UserPair`]. All
//! "is there a relationship between A and B" questions are answered through
//! the canonical columns, so a request from B to A collides with an existing
//! one from A to B on the unique index.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use studyhub_shared::{PeerStatus, RelationshipId, UserId, UserPair};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{PeerRelationship, PeerRelationshipView};
use crate::row;
use crate::shares;
use crate::users::summary_at;

const REL_COLUMNS: &str = "id, requester_id, addressee_id, status, created_at, updated_at";

const VIEW_SELECT: &str = "SELECT r.id, rq.id, rq.username, ad.id, ad.username,
                                  r.status, r.created_at, r.updated_at
                           FROM peer_relationships r
                           JOIN users rq ON rq.id = r.requester_id
                           JOIN users ad ON ad.id = r.addressee_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a relationship.  A relationship already existing between the
    /// same two users, in either direction, yields [`StoreError::Conflict`];
    /// an unknown user yields [`StoreError::NotFound`].
    pub fn create_relationship(&self, rel: &PeerRelationship) -> Result<()> {
        let pair = rel.pair();
        self.conn()
            .execute(
                "INSERT INTO peer_relationships
                     (id, requester_id, addressee_id, user_low, user_high, status,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rel.id.to_string(),
                    rel.requester_id.to_string(),
                    rel.addressee_id.to_string(),
                    pair.low().to_string(),
                    pair.high().to_string(),
                    rel.status.as_str(),
                    row::ts(&rel.created_at),
                    row::ts(&rel.updated_at),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "peer relationship"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_relationship(&self, id: RelationshipId) -> Result<PeerRelationship> {
        self.conn()
            .query_row(
                &format!("SELECT {REL_COLUMNS} FROM peer_relationships WHERE id = ?1"),
                params![id.to_string()],
                row_to_relationship,
            )
            .map_err(StoreError::from_read)
    }

    /// The relationship between the two users of `pair`, whoever requested it.
    pub fn relationship_between(&self, pair: UserPair) -> Result<Option<PeerRelationship>> {
        let rel = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {REL_COLUMNS} FROM peer_relationships
                     WHERE user_low = ?1 AND user_high = ?2"
                ),
                params![pair.low().to_string(), pair.high().to_string()],
                row_to_relationship,
            )
            .optional()?;
        Ok(rel)
    }

    pub fn get_relationship_view(&self, id: RelationshipId) -> Result<PeerRelationshipView> {
        self.conn()
            .query_row(
                &format!("{VIEW_SELECT} WHERE r.id = ?1"),
                params![id.to_string()],
                row_to_view,
            )
            .map_err(StoreError::from_read)
    }

    /// Relationships in `status` where `user` is either participant.
    pub fn list_relationships_for(
        &self,
        user: UserId,
        status: PeerStatus,
    ) -> Result<Vec<PeerRelationshipView>> {
        let mut stmt = self.conn().prepare(&format!(
            "{VIEW_SELECT}
             WHERE (r.requester_id = ?1 OR r.addressee_id = ?1) AND r.status = ?2
             ORDER BY r.updated_at DESC"
        ))?;
        let rows = stmt.query_map(params![user.to_string(), status.as_str()], row_to_view)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Relationships in `status` addressed to `user`.
    pub fn list_incoming_for(
        &self,
        user: UserId,
        status: PeerStatus,
    ) -> Result<Vec<PeerRelationshipView>> {
        let mut stmt = self.conn().prepare(&format!(
            "{VIEW_SELECT}
             WHERE r.addressee_id = ?1 AND r.status = ?2
             ORDER BY r.created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user.to_string(), status.as_str()], row_to_view)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move a pending relationship addressed to `addressee` into `to`.
    ///
    /// The guard and the write are one statement, so a relationship that is
    /// missing, addressed to someone else, or no longer pending all come back
    /// as `None` and nothing changes.
    pub fn answer_pending(
        &self,
        id: RelationshipId,
        addressee: UserId,
        to: PeerStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<PeerRelationship>> {
        let rel = self
            .conn()
            .query_row(
                &format!(
                    "UPDATE peer_relationships
                     SET status = ?1, updated_at = ?2
                     WHERE id = ?3 AND addressee_id = ?4 AND status = 'pending'
                     RETURNING {REL_COLUMNS}"
                ),
                params![
                    to.as_str(),
                    row::ts(&now),
                    id.to_string(),
                    addressee.to_string(),
                ],
                row_to_relationship,
            )
            .optional()?;
        Ok(rel)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an accepted relationship and deactivate every active share
    /// between its two participants, in both directions, in one transaction.
    ///
    /// Returns the number of shares deactivated, or [`StoreError::NotFound`]
    /// (with nothing changed) if no accepted row with that id remains.
    pub fn remove_relationship(&self, rel: &PeerRelationship) -> Result<usize> {
        let tx = self.transaction()?;

        let deactivated = shares::deactivate_between(&tx, rel.pair())?;

        let deleted = tx.execute(
            "DELETE FROM peer_relationships WHERE id = ?1 AND status = ?2",
            params![rel.id.to_string(), PeerStatus::Accepted.as_str()],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()?;
        Ok(deactivated)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_relationship(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerRelationship> {
    Ok(PeerRelationship {
        id: RelationshipId(row::uuid_at(row, 0)?),
        requester_id: UserId(row::uuid_at(row, 1)?),
        addressee_id: UserId(row::uuid_at(row, 2)?),
        status: row::enum_at(row, 3, PeerStatus::parse)?,
        created_at: row::ts_at(row, 4)?,
        updated_at: row::ts_at(row, 5)?,
    })
}

fn row_to_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerRelationshipView> {
    Ok(PeerRelationshipView {
        id: RelationshipId(row::uuid_at(row, 0)?),
        requester: summary_at(row, 1)?,
        addressee: summary_at(row, 3)?,
        status: row::enum_at(row, 5, PeerStatus::parse)?,
        created_at: row::ts_at(row, 6)?,
        updated_at: row::ts_at(row, 7)?,
    })
}
