//! Topic share engine and share-access audit.
//!
//! A share is a one-way read-only grant of a topic from its owner to an
//! accepted peer. It can be revoked by the owner or left by the peer
//! without touching the relationship, and it never outlives the
//! relationship (see [`peers::remove`](crate::peers::remove)).

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use studyhub_shared::{AccessType, CardId, PermissionLevel, TopicId, UserId, ValidationError};
use studyhub_store::{
    Card, Database, ShareAccessView, StoreError, TopicShare, TopicShareView, UserSummary,
};

use crate::access::Gate;
use crate::content::TopicDetail;
use crate::error::{CoreError, CoreResult};

/// Read-only projection of a topic shared with the caller. Unlike the
/// owner's own view it names the owner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SharedTopic {
    #[serde(flatten)]
    pub topic: TopicDetail,
    pub owner: UserSummary,
}

/// Result of [`share`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShareGrant {
    #[serde(flatten)]
    pub share: TopicShare,
    /// `false` when an earlier grant was reactivated.
    pub created: bool,
}

/// Active shares of a topic the caller owns.
pub fn list_shares(
    db: &Database,
    caller: UserId,
    topic_id: TopicId,
) -> CoreResult<Vec<TopicShareView>> {
    let topic = Gate::new(db, caller).owned_topic(topic_id)?;
    Ok(db.list_active_shares_for_topic(topic.id)?)
}

/// Grant `peer` read access to a topic the caller owns.
pub fn share(
    db: &Database,
    caller: UserId,
    topic_id: TopicId,
    peer: UserId,
) -> CoreResult<ShareGrant> {
    let gate = Gate::new(db, caller);
    let topic = gate.owned_topic(topic_id)?;

    if peer == caller {
        return Err(ValidationError::SelfShare.into());
    }
    if !db.user_exists(peer)? {
        return Err(CoreError::NotFound("User"));
    }
    if !gate.is_peer(peer)? {
        return Err(CoreError::Forbidden(
            "You can only share topics with accepted peers".into(),
        ));
    }

    let (share, created) =
        match db.upsert_share(topic.id, peer, PermissionLevel::ReadOnly, Utc::now()) {
            Ok(res) => res,
            Err(StoreError::NotFound) => return Err(CoreError::NotFound("Topic")),
            Err(e) => return Err(e.into()),
        };

    info!(
        share_id = %share.id,
        topic_id = %topic.id,
        owner = %caller,
        peer = %peer,
        created,
        "topic shared"
    );
    Ok(ShareGrant { share, created })
}

/// Withdraw the caller's active share of their topic with `peer`.
pub fn revoke(db: &Database, caller: UserId, topic_id: TopicId, peer: UserId) -> CoreResult<()> {
    let topic = Gate::new(db, caller).owned_topic(topic_id)?;

    if !db.deactivate_share(topic.id, peer)? {
        return Err(CoreError::NotFound("Share"));
    }

    info!(topic_id = %topic.id, owner = %caller, peer = %peer, "share revoked");
    Ok(())
}

/// Every topic actively shared with the caller, with cards and owner.
pub fn list_shared_with_me(db: &Database, caller: UserId) -> CoreResult<Vec<SharedTopic>> {
    let shared = db.list_topics_shared_with(caller)?;

    let mut out = Vec::with_capacity(shared.len());
    for (topic, owner) in shared {
        let cards = db.list_cards_for_topic(topic.id)?;
        out.push(SharedTopic {
            topic: TopicDetail::new(topic, cards),
            owner,
        });
    }
    Ok(out)
}

/// Read a topic shared with the caller. Appends one `view_topic` audit row,
/// committed only together with a successful read.
pub fn retrieve_shared(db: &Database, caller: UserId, topic_id: TopicId) -> CoreResult<SharedTopic> {
    let tx = db.transaction()?;

    let access = db
        .record_access(topic_id, caller, AccessType::ViewTopic, Utc::now())?
        .ok_or(CoreError::NotFound("Shared topic"))?;

    let topic = db.get_topic(topic_id)?;
    let owner = db.get_user(topic.owner_id)?.summary();
    let cards = db.list_cards_for_topic(topic.id)?;

    tx.commit().map_err(StoreError::from)?;
    debug!(share_id = %access.share_id, peer = %caller, "shared topic viewed");

    Ok(SharedTopic {
        topic: TopicDetail::new(topic, cards),
        owner,
    })
}

/// Read one card of a topic shared with the caller. Appends one
/// `view_card` audit row.
pub fn retrieve_shared_card(db: &Database, caller: UserId, card_id: CardId) -> CoreResult<Card> {
    let card = match db.get_card(card_id) {
        Ok(card) => card,
        Err(StoreError::NotFound) => return Err(CoreError::NotFound("Shared card")),
        Err(e) => return Err(e.into()),
    };

    let access = db
        .record_access(card.topic_id, caller, AccessType::ViewCard, Utc::now())?
        .ok_or(CoreError::NotFound("Shared card"))?;
    debug!(share_id = %access.share_id, card_id = %card.id, peer = %caller, "shared card viewed");

    Ok(card)
}

/// Drop the caller's own active share of a topic someone shared with them.
pub fn leave(db: &Database, caller: UserId, topic_id: TopicId) -> CoreResult<()> {
    let share = Gate::new(db, caller).shared_topic(topic_id)?;

    if !db.deactivate_share(share.topic_id, caller)? {
        return Err(CoreError::NotFound("Shared topic"));
    }

    info!(topic_id = %topic_id, peer = %caller, owner = %share.owner_id, "left shared topic");
    Ok(())
}

/// Audit trail of a topic the caller owns, newest first.
pub fn access_log(
    db: &Database,
    caller: UserId,
    topic_id: TopicId,
) -> CoreResult<Vec<ShareAccessView>> {
    let topic = Gate::new(db, caller).owned_topic(topic_id)?;
    Ok(db.list_accesses_for_topic(topic.id)?)
}
