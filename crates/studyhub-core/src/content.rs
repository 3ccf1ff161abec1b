//! Owner-scoped topic and card CRUD.
//!
//! Nothing here is visible to peers: shared reads go through
//! [`shares`](crate::shares), which records an audit row for each one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use studyhub_shared::{validate, CardId, TopicId, UserId};
use studyhub_store::{Card, Database, Topic};

use crate::access::Gate;
use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

fn yes() -> bool {
    true
}

/// Card fields accepted on creation and full update. Omitted fields take
/// their defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CardFields {
    pub name: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub starred: bool,
    #[serde(default = "yes")]
    pub collapsed: bool,
}

impl CardFields {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resource: String::new(),
            note: String::new(),
            progress: 0,
            starred: false,
            collapsed: true,
        }
    }

    fn validated(self) -> CoreResult<Self> {
        Ok(Self {
            name: validate::name("name", &self.name)?,
            progress: validate::progress(self.progress)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTopic {
    pub name: String,
    #[serde(default)]
    pub collapsed: bool,
    /// Created in the same transaction as the topic.
    #[serde(default)]
    pub cards: Vec<CardFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicUpdate {
    pub name: String,
    #[serde(default)]
    pub collapsed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicPatch {
    pub name: Option<String>,
    pub collapsed: Option<bool>,
}

/// A card together with the topic it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
    pub topic: TopicId,
    #[serde(flatten)]
    pub card: CardFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardPatch {
    pub topic: Option<TopicId>,
    pub name: Option<String>,
    pub resource: Option<String>,
    pub note: Option<String>,
    pub progress: Option<i64>,
    pub starred: Option<bool>,
    pub collapsed: Option<bool>,
}

/// A topic with its cards in creation order. The owner is implied by the
/// caller and not repeated.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopicDetail {
    pub id: TopicId,
    pub name: String,
    pub collapsed: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    pub cards: Vec<Card>,
}

impl TopicDetail {
    pub fn new(topic: Topic, cards: Vec<Card>) -> Self {
        Self {
            id: topic.id,
            name: topic.name,
            collapsed: topic.collapsed,
            created_at: topic.created_at,
            updated_at: topic.updated_at,
            cards,
        }
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// The caller's topics, newest first, each with its cards.
pub fn list_topics(db: &Database, caller: UserId) -> CoreResult<Vec<TopicDetail>> {
    let topics = db.list_topics_for_owner(caller)?;
    let mut out = Vec::with_capacity(topics.len());
    for topic in topics {
        let cards = db.list_cards_for_topic(topic.id)?;
        out.push(TopicDetail::new(topic, cards));
    }
    Ok(out)
}

pub fn create_topic(db: &Database, caller: UserId, new: NewTopic) -> CoreResult<TopicDetail> {
    let name = validate::name("name", &new.name)?;
    let fields = new
        .cards
        .into_iter()
        .map(CardFields::validated)
        .collect::<CoreResult<Vec<_>>>()?;

    let now = Utc::now();
    let topic = Topic {
        id: TopicId::new(),
        owner_id: caller,
        name,
        collapsed: new.collapsed,
        created_at: now,
        updated_at: now,
    };
    let cards: Vec<Card> = fields
        .into_iter()
        .map(|f| build_card(topic.id, f, now))
        .collect();

    db.create_topic_with_cards(&topic, &cards)?;

    info!(topic_id = %topic.id, owner = %caller, cards = cards.len(), "topic created");
    Ok(TopicDetail::new(topic, cards))
}

pub fn retrieve_topic(db: &Database, caller: UserId, id: TopicId) -> CoreResult<TopicDetail> {
    let topic = Gate::new(db, caller).owned_topic(id)?;
    let cards = db.list_cards_for_topic(topic.id)?;
    Ok(TopicDetail::new(topic, cards))
}

pub fn update_topic(
    db: &Database,
    caller: UserId,
    id: TopicId,
    update: TopicUpdate,
) -> CoreResult<TopicDetail> {
    patch_topic(
        db,
        caller,
        id,
        TopicPatch {
            name: Some(update.name),
            collapsed: Some(update.collapsed),
        },
    )
}

pub fn patch_topic(
    db: &Database,
    caller: UserId,
    id: TopicId,
    patch: TopicPatch,
) -> CoreResult<TopicDetail> {
    let mut topic = Gate::new(db, caller).owned_topic(id)?;

    if let Some(name) = patch.name {
        topic.name = validate::name("name", &name)?;
    }
    if let Some(collapsed) = patch.collapsed {
        topic.collapsed = collapsed;
    }
    topic.updated_at = Utc::now();

    if !db.update_topic(&topic)? {
        return Err(CoreError::NotFound("Topic"));
    }
    debug!(topic_id = %topic.id, "topic updated");

    let cards = db.list_cards_for_topic(topic.id)?;
    Ok(TopicDetail::new(topic, cards))
}

/// Cards, shares and their access log are deleted with the topic.
pub fn delete_topic(db: &Database, caller: UserId, id: TopicId) -> CoreResult<()> {
    let topic = Gate::new(db, caller).owned_topic(id)?;
    if !db.delete_topic(topic.id)? {
        return Err(CoreError::NotFound("Topic"));
    }
    info!(topic_id = %topic.id, owner = %caller, "topic deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Cards of the caller's topics, optionally limited to one of them.
pub fn list_cards(
    db: &Database,
    caller: UserId,
    topic: Option<TopicId>,
) -> CoreResult<Vec<Card>> {
    match topic {
        Some(id) => {
            let topic = Gate::new(db, caller).owned_topic(id)?;
            Ok(db.list_cards_for_topic(topic.id)?)
        }
        None => Ok(db.list_cards_for_owner(caller)?),
    }
}

pub fn create_card(db: &Database, caller: UserId, new: NewCard) -> CoreResult<Card> {
    let topic = Gate::new(db, caller).owned_topic(new.topic)?;
    let card = build_card(topic.id, new.card.validated()?, Utc::now());

    db.create_card(&card)?;

    info!(card_id = %card.id, topic_id = %topic.id, "card created");
    Ok(card)
}

pub fn retrieve_card(db: &Database, caller: UserId, id: CardId) -> CoreResult<Card> {
    Gate::new(db, caller).owned_card(id)
}

/// Replace every field of a card. Omitted optional fields reset to their
/// defaults.
pub fn update_card(db: &Database, caller: UserId, id: CardId, update: NewCard) -> CoreResult<Card> {
    let fields = update.card;
    patch_card(
        db,
        caller,
        id,
        CardPatch {
            topic: Some(update.topic),
            name: Some(fields.name),
            resource: Some(fields.resource),
            note: Some(fields.note),
            progress: Some(fields.progress),
            starred: Some(fields.starred),
            collapsed: Some(fields.collapsed),
        },
    )
}

pub fn patch_card(db: &Database, caller: UserId, id: CardId, patch: CardPatch) -> CoreResult<Card> {
    let gate = Gate::new(db, caller);
    let mut card = gate.owned_card(id)?;

    if let Some(dest) = patch.topic {
        if dest != card.topic_id {
            card.topic_id = gate.owned_topic(dest)?.id;
        }
    }
    if let Some(name) = patch.name {
        card.name = validate::name("name", &name)?;
    }
    if let Some(progress) = patch.progress {
        card.progress = validate::progress(progress)?;
    }
    if let Some(resource) = patch.resource {
        card.resource = resource;
    }
    if let Some(note) = patch.note {
        card.note = note;
    }
    if let Some(starred) = patch.starred {
        card.starred = starred;
    }
    if let Some(collapsed) = patch.collapsed {
        card.collapsed = collapsed;
    }
    card.updated_at = Utc::now();

    if !db.update_card(&card)? {
        return Err(CoreError::NotFound("Card"));
    }
    debug!(card_id = %card.id, topic_id = %card.topic_id, "card updated");
    Ok(card)
}

pub fn delete_card(db: &Database, caller: UserId, id: CardId) -> CoreResult<()> {
    let card = Gate::new(db, caller).owned_card(id)?;
    if !db.delete_card(card.id)? {
        return Err(CoreError::NotFound("Card"));
    }
    info!(card_id = %card.id, topic_id = %card.topic_id, "card deleted");
    Ok(())
}

fn build_card(topic_id: TopicId, fields: CardFields, now: chrono::DateTime<Utc>) -> Card {
    Card {
        id: CardId::new(),
        topic_id,
        name: fields.name,
        resource: fields.resource,
        note: fields.note,
        progress: fields.progress,
        starred: fields.starred,
        collapsed: fields.collapsed,
        created_at: now,
        updated_at: now,
    }
}
