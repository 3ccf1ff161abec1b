//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer. Fields that must never leave the server
//! (password hashes) or that the canonical projection hides (topic owner)
//! are skipped on serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_shared::{
    AccessId, AccessType, CardId, PeerStatus, PermissionLevel, RelationshipId, ShareId, TopicId,
    UserId, UserPair,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique, compared case-insensitively.
    pub username: String,
    pub email: Option<String>,
    /// Argon2 PHC string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// The public face of a user, embedded in peer and share listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Topic / Card
// ---------------------------------------------------------------------------

/// A study topic. Exactly one owner; cards, shares and accesses go with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    #[serde(skip_serializing, default)]
    pub owner_id: UserId,
    pub name: String,
    pub collapsed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A card inside a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    #[serde(rename = "topic")]
    pub topic_id: TopicId,
    pub name: String,
    pub resource: String,
    pub note: String,
    /// Percentage in `[0, 100]`.
    pub progress: i64,
    pub starred: bool,
    pub collapsed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Peer relationship
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRelationship {
    pub id: RelationshipId,
    pub requester_id: UserId,
    pub addressee_id: UserId,
    pub status: PeerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PeerRelationship {
    pub fn pair(&self) -> UserPair {
        UserPair::new(self.requester_id, self.addressee_id)
    }
}

/// A relationship together with both participants' public identities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerRelationshipView {
    pub id: RelationshipId,
    pub requester: UserSummary,
    pub addressee: UserSummary,
    pub status: PeerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Topic share
// ---------------------------------------------------------------------------

/// Read-only grant of one topic to one peer. At most one row per
/// `(topic, peer)`; revocation flips `is_active` instead of deleting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicShare {
    pub id: ShareId,
    pub topic_id: TopicId,
    pub owner_id: UserId,
    pub peer_id: UserId,
    pub permission_level: PermissionLevel,
    pub shared_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A share as listed to the topic owner, with the peer's identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicShareView {
    pub id: ShareId,
    pub topic_id: TopicId,
    pub peer: UserSummary,
    pub permission_level: PermissionLevel,
    pub shared_at: DateTime<Utc>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Share access (audit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareAccess {
    pub id: AccessId,
    pub share_id: ShareId,
    pub accessed_at: DateTime<Utc>,
    pub access_type: AccessType,
}

/// An audit row joined with the peer that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareAccessView {
    pub id: AccessId,
    pub share_id: ShareId,
    pub peer: UserSummary,
    pub accessed_at: DateTime<Utc>,
    pub access_type: AccessType,
}
