//! CRUD operations for [`Topic`] records.

use rusqlite::{params, Connection};

use studyhub_shared::{TopicId, UserId};

use crate::cards;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Card, Topic};
use crate::row;

pub(crate) const TOPIC_COLUMNS: &str = "id, owner_id, name, collapsed, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_topic(&self, topic: &Topic) -> Result<()> {
        insert_topic(self.conn(), topic)
    }

    /// Insert a topic and its initial cards atomically.
    pub fn create_topic_with_cards(&self, topic: &Topic, cards: &[Card]) -> Result<()> {
        let tx = self.transaction()?;
        insert_topic(&tx, topic)?;
        for card in cards {
            cards::insert_card(&tx, card)?;
        }
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_topic(&self, id: TopicId) -> Result<Topic> {
        self.conn()
            .query_row(
                &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = ?1"),
                params![id.to_string()],
                row_to_topic,
            )
            .map_err(StoreError::from_read)
    }

    /// All topics owned by `owner`, newest first.
    pub fn list_topics_for_owner(&self, owner: UserId) -> Result<Vec<Topic>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TOPIC_COLUMNS}
             FROM topics
             WHERE owner_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_topic)?;

        let mut topics = Vec::new();
        for row in rows {
            topics.push(row?);
        }
        Ok(topics)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist the mutable fields (`name`, `collapsed`, `updated_at`).
    pub fn update_topic(&self, topic: &Topic) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE topics SET name = ?1, collapsed = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                topic.name,
                topic.collapsed,
                row::ts(&topic.updated_at),
                topic.id.to_string(),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    // ON DELETE CASCADE: cards, shares and their access log go with it
    pub fn delete_topic(&self, id: TopicId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM topics WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_topic(conn: &Connection, topic: &Topic) -> Result<()> {
    conn.execute(
        "INSERT INTO topics (id, owner_id, name, collapsed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            topic.id.to_string(),
            topic.owner_id.to_string(),
            topic.name,
            topic.collapsed,
            row::ts(&topic.created_at),
            row::ts(&topic.updated_at),
        ],
    )
    .map_err(|e| StoreError::from_write(e, "topic"))?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Topic`], reading columns from `idx` on.
pub(crate) fn topic_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: TopicId(row::uuid_at(row, idx)?),
        owner_id: UserId(row::uuid_at(row, idx + 1)?),
        name: row.get(idx + 2)?,
        collapsed: row.get(idx + 3)?,
        created_at: row::ts_at(row, idx + 4)?,
        updated_at: row::ts_at(row, idx + 5)?,
    })
}

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<Topic> {
    topic_at(row, 0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::users::tests::user;
    use chrono::{Duration, Utc};

    pub(crate) fn topic(db: &Database, owner: UserId, name: &str) -> Topic {
        let now = Utc::now();
        let topic = Topic {
            id: TopicId::new(),
            owner_id: owner,
            name: name.to_string(),
            collapsed: false,
            created_at: now,
            updated_at: now,
        };
        db.create_topic(&topic).unwrap();
        topic
    }

    #[test]
    fn list_is_owner_scoped_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let now = Utc::now();
        for (i, name) in ["first", "second"].iter().enumerate() {
            let t = Topic {
                id: TopicId::new(),
                owner_id: alice.id,
                name: name.to_string(),
                collapsed: false,
                created_at: now + Duration::seconds(i as i64),
                updated_at: now,
            };
            db.create_topic(&t).unwrap();
        }
        topic(&db, bob.id, "bob's");

        let names: Vec<_> = db
            .list_topics_for_owner(alice.id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let mut t = topic(&db, alice.id, "Rust");

        t.name = "Rust 2024".into();
        t.collapsed = true;
        assert!(db.update_topic(&t).unwrap());
        let fetched = db.get_topic(t.id).unwrap();
        assert_eq!(fetched.name, "Rust 2024");
        assert!(fetched.collapsed);

        assert!(db.delete_topic(t.id).unwrap());
        assert!(matches!(db.get_topic(t.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn topic_requires_existing_owner() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let orphan = Topic {
            id: TopicId::new(),
            owner_id: UserId::new(),
            name: "orphan".into(),
            collapsed: false,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(db.create_topic(&orphan), Err(StoreError::NotFound)));
    }

    #[test]
    fn deleting_owner_cascades() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let t = topic(&db, alice.id, "Rust");

        db.delete_user(alice.id).unwrap();
        assert!(matches!(db.get_topic(t.id), Err(StoreError::NotFound)));
    }
}
