use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Account identity. Every content row is scoped by one of these.
    UserId
);
uuid_id!(TopicId);
uuid_id!(CardId);
uuid_id!(
    /// Primary key of a `PeerRelationship` row.
    RelationshipId
);
uuid_id!(ShareId);
uuid_id!(AccessId);

// ---------------------------------------------------------------------------
// Peer relationship status
// ---------------------------------------------------------------------------

/// Lifecycle of a peer request.
///
/// `Pending` is the only state from which the addressee may move the
/// relationship, to either `Accepted` or `Rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Pending,
    Accepted,
    Rejected,
    Blocked,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Share permission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    #[default]
    ReadOnly,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read_only" => Some(Self::ReadOnly),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Audit access type
// ---------------------------------------------------------------------------

/// What a peer looked at when a `ShareAccess` row was appended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    ViewTopic,
    ViewCard,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewTopic => "view_topic",
            Self::ViewCard => "view_card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view_topic" => Some(Self::ViewTopic),
            "view_card" => Some(Self::ViewCard),
            _ => None,
        }
    }
}

/// Unordered pair of identities.
///
/// Peer relationships and share cascades are symmetric: `{A, B}` and
/// `{B, A}` name the same pair. Every bidirectional lookup goes through
/// this type so both orderings are always covered by one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserPair {
    low: UserId,
    high: UserId,
}

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }

    /// The participant that is not `user`, if `user` is part of the pair.
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if user == self.low {
            Some(self.high)
        } else if user == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}
