//! Fixtures shared by the unit tests of this crate.

use chrono::Utc;

use studyhub_shared::{RelationshipId, TopicId, UserId};
use studyhub_store::{Database, User};

use crate::{content, peers};

pub(crate) fn db() -> Database {
    Database::open_in_memory().unwrap()
}

/// Insert a user directly, skipping the (slow) password hash.
pub(crate) fn member(db: &Database, name: &str) -> UserId {
    let user = User {
        id: UserId::new(),
        username: name.to_string(),
        email: None,
        password_hash: "unused".into(),
        date_joined: Utc::now(),
    };
    db.create_user(&user).unwrap();
    user.id
}

pub(crate) fn owned_topic(db: &Database, owner: UserId, name: &str) -> TopicId {
    content::create_topic(
        db,
        owner,
        content::NewTopic {
            name: name.to_string(),
            collapsed: false,
            cards: Vec::new(),
        },
    )
    .unwrap()
    .id
}

/// Make `a` and `b` accepted peers, `a` having asked.
pub(crate) fn befriend(db: &Database, a: UserId, b: UserId) -> RelationshipId {
    let req = peers::send_request(db, a, b).unwrap();
    peers::accept(db, b, req.id).unwrap();
    req.id
}
