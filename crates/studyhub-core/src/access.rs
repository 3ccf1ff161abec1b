//! Authorization gate.
//!
//! One predicate per entity type, shared by every operation that touches
//! that entity. Each predicate either hands back the record the caller is
//! allowed to act on or fails with `NotFound`: a record that exists but
//! belongs to someone else is indistinguishable from one that does not
//! exist.

use studyhub_shared::{CardId, PeerStatus, RelationshipId, TopicId, UserId, UserPair};
use studyhub_store::{Card, Database, PeerRelationship, StoreError, Topic, TopicShare};

use crate::error::{CoreError, CoreResult};

/// The caller's view of the store.
pub struct Gate<'a> {
    db: &'a Database,
    caller: UserId,
}

impl<'a> Gate<'a> {
    pub fn new(db: &'a Database, caller: UserId) -> Self {
        Self { db, caller }
    }

    pub fn caller(&self) -> UserId {
        self.caller
    }

    /// A topic the caller owns.
    pub fn owned_topic(&self, id: TopicId) -> CoreResult<Topic> {
        match self.db.get_topic(id) {
            Ok(topic) if topic.owner_id == self.caller => Ok(topic),
            Ok(_) | Err(StoreError::NotFound) => Err(CoreError::NotFound("Topic")),
            Err(e) => Err(e.into()),
        }
    }

    /// A card in a topic the caller owns.
    pub fn owned_card(&self, id: CardId) -> CoreResult<Card> {
        let card = match self.db.get_card(id) {
            Ok(card) => card,
            Err(StoreError::NotFound) => return Err(CoreError::NotFound("Card")),
            Err(e) => return Err(e.into()),
        };
        match self.owned_topic(card.topic_id) {
            Ok(_) => Ok(card),
            Err(CoreError::NotFound(_)) => Err(CoreError::NotFound("Card")),
            Err(e) => Err(e),
        }
    }

    /// A relationship the caller participates in, with the other participant.
    pub fn relationship(&self, id: RelationshipId) -> CoreResult<(PeerRelationship, UserId)> {
        match self.db.get_relationship(id) {
            Ok(rel) => match rel.pair().other(self.caller) {
                Some(other) => Ok((rel, other)),
                None => Err(CoreError::NotFound("Peer relationship")),
            },
            Err(StoreError::NotFound) => Err(CoreError::NotFound("Peer relationship")),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the caller and `other` have an accepted relationship,
    /// whichever of them sent the request.
    pub fn is_peer(&self, other: UserId) -> CoreResult<bool> {
        let rel = self
            .db
            .relationship_between(UserPair::new(self.caller, other))?;
        Ok(matches!(rel, Some(r) if r.status == PeerStatus::Accepted))
    }

    /// The active share granting the caller read access to `topic_id`.
    pub fn shared_topic(&self, topic_id: TopicId) -> CoreResult<TopicShare> {
        self.db
            .active_share(topic_id, self.caller)?
            .ok_or(CoreError::NotFound("Shared topic"))
    }
}
