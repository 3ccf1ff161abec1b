//! Peer relationship engine.
//!
//! A relationship starts `pending` when one user requests another, moves to
//! `accepted` or `rejected` only by the addressee's hand. Once accepted it
//! can be removed by either participant; removal deactivates every share
//! between the two users in the same transaction. A rejection stays on
//! record and keeps the pair out of search and new requests.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use studyhub_shared::constants::MAX_SEARCH_RESULTS;
use studyhub_shared::{validate, PeerStatus, RelationshipId, UserId, ValidationError};
use studyhub_store::{Database, PeerRelationship, PeerRelationshipView, StoreError, UserSummary};

use crate::access::Gate;
use crate::error::{CoreError, CoreResult};

/// Outcome of [`remove`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Removal {
    pub relationship_id: RelationshipId,
    pub shares_deactivated: usize,
}

/// Users whose name contains `query`, excluding the caller and anyone the
/// caller already has a relationship with (any status, either direction).
pub fn search(db: &Database, caller: UserId, query: &str) -> CoreResult<Vec<UserSummary>> {
    let query = validate::search_query(query)?;
    let found = db.search_users(caller, query, MAX_SEARCH_RESULTS)?;
    debug!(caller = %caller, query, results = found.len(), "peer search");
    Ok(found)
}

pub fn send_request(
    db: &Database,
    caller: UserId,
    target: UserId,
) -> CoreResult<PeerRelationshipView> {
    if caller == target {
        return Err(ValidationError::SelfPeering.into());
    }
    if !db.user_exists(target)? {
        return Err(CoreError::NotFound("User"));
    }

    let now = Utc::now();
    let rel = PeerRelationship {
        id: RelationshipId::new(),
        requester_id: caller,
        addressee_id: target,
        status: PeerStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    // The unique index on the canonical pair decides races between two
    // simultaneous requests, in either direction.
    match db.create_relationship(&rel) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(CoreError::Conflict(
                "A peer relationship with this user already exists".into(),
            ))
        }
        Err(StoreError::NotFound) => return Err(CoreError::NotFound("User")),
        Err(e) => return Err(e.into()),
    }

    info!(relationship_id = %rel.id, requester = %caller, addressee = %target, "peer request sent");
    Ok(db.get_relationship_view(rel.id)?)
}

pub fn accept(
    db: &Database,
    caller: UserId,
    id: RelationshipId,
) -> CoreResult<PeerRelationshipView> {
    answer(db, caller, id, PeerStatus::Accepted)
}

pub fn reject(
    db: &Database,
    caller: UserId,
    id: RelationshipId,
) -> CoreResult<PeerRelationshipView> {
    answer(db, caller, id, PeerStatus::Rejected)
}

/// Wrong caller, wrong status and unknown id all report `NotFound`.
fn answer(
    db: &Database,
    caller: UserId,
    id: RelationshipId,
    to: PeerStatus,
) -> CoreResult<PeerRelationshipView> {
    let rel = db
        .answer_pending(id, caller, to, Utc::now())?
        .ok_or(CoreError::NotFound("Peer request"))?;

    info!(relationship_id = %rel.id, addressee = %caller, status = %to, "peer request answered");
    Ok(db.get_relationship_view(rel.id)?)
}

pub fn list_accepted(db: &Database, caller: UserId) -> CoreResult<Vec<PeerRelationshipView>> {
    Ok(db.list_relationships_for(caller, PeerStatus::Accepted)?)
}

pub fn list_pending_incoming(
    db: &Database,
    caller: UserId,
) -> CoreResult<Vec<PeerRelationshipView>> {
    Ok(db.list_incoming_for(caller, PeerStatus::Pending)?)
}

/// Delete an accepted relationship the caller takes part in and cut every
/// sharing tie between the two users. Pending and rejected rows report
/// `NotFound`.
pub fn remove(db: &Database, caller: UserId, id: RelationshipId) -> CoreResult<Removal> {
    let (rel, other) = Gate::new(db, caller).relationship(id)?;
    if rel.status != PeerStatus::Accepted {
        return Err(CoreError::NotFound("Peer relationship"));
    }

    let shares_deactivated = match db.remove_relationship(&rel) {
        Ok(n) => n,
        Err(StoreError::NotFound) => return Err(CoreError::NotFound("Peer relationship")),
        Err(e) => return Err(e.into()),
    };

    info!(
        relationship_id = %id,
        caller = %caller,
        other = %other,
        shares_deactivated,
        "peer relationship removed"
    );
    Ok(Removal {
        relationship_id: id,
        shares_deactivated,
    })
}
