//! CRUD operations for [`Card`] records.

use rusqlite::{params, Connection};

use studyhub_shared::{CardId, TopicId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Card;
use crate::row;

const CARD_COLUMNS: &str = "c.id, c.topic_id, c.name, c.resource, c.note, c.progress, \
                            c.starred, c.collapsed, c.created_at, c.updated_at";

impl Database {
    pub fn create_card(&self, card: &Card) -> Result<()> {
        insert_card(self.conn(), card)
    }

    pub fn get_card(&self, id: CardId) -> Result<Card> {
        self.conn()
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards c WHERE c.id = ?1"),
                params![id.to_string()],
                row_to_card,
            )
            .map_err(StoreError::from_read)
    }

    /// Cards of one topic in creation order.
    pub fn list_cards_for_topic(&self, topic_id: TopicId) -> Result<Vec<Card>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CARD_COLUMNS}
             FROM cards c
             WHERE c.topic_id = ?1
             ORDER BY c.created_at ASC, c.rowid ASC"
        ))?;

        let rows = stmt.query_map(params![topic_id.to_string()], row_to_card)?;

        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        Ok(cards)
    }

    /// Every card in topics owned by `owner`, in creation order.
    pub fn list_cards_for_owner(&self, owner: UserId) -> Result<Vec<Card>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CARD_COLUMNS}
             FROM cards c
             JOIN topics t ON t.id = c.topic_id
             WHERE t.owner_id = ?1
             ORDER BY c.created_at ASC, c.rowid ASC"
        ))?;

        let rows = stmt.query_map(params![owner.to_string()], row_to_card)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Persist every mutable card field, including a move to another topic.
    pub fn update_card(&self, card: &Card) -> Result<bool> {
        let affected = self
            .conn()
            .execute(
                "UPDATE cards
                 SET topic_id = ?1, name = ?2, resource = ?3, note = ?4, progress = ?5,
                     starred = ?6, collapsed = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    card.topic_id.to_string(),
                    card.name,
                    card.resource,
                    card.note,
                    card.progress,
                    card.starred,
                    card.collapsed,
                    row::ts(&card.updated_at),
                    card.id.to_string(),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "card"))?;
        Ok(affected > 0)
    }

    pub fn delete_card(&self, id: CardId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn insert_card(conn: &Connection, card: &Card) -> Result<()> {
    conn.execute(
        "INSERT INTO cards (id, topic_id, name, resource, note, progress, starred, collapsed,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            card.id.to_string(),
            card.topic_id.to_string(),
            card.name,
            card.resource,
            card.note,
            card.progress,
            card.starred,
            card.collapsed,
            row::ts(&card.created_at),
            row::ts(&card.updated_at),
        ],
    )
    .map_err(|e| StoreError::from_write(e, "card"))?;
    Ok(())
}

fn row_to_card(row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: CardId(row::uuid_at(row, 0)?),
        topic_id: TopicId(row::uuid_at(row, 1)?),
        name: row.get(2)?,
        resource: row.get(3)?,
        note: row.get(4)?,
        progress: row.get(5)?,
        starred: row.get(6)?,
        collapsed: row.get(7)?,
        created_at: row::ts_at(row, 8)?,
        updated_at: row::ts_at(row, 9)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::topics::tests::topic;
    use crate::users::tests::user;
    use chrono::Utc;

    pub(crate) fn card(topic_id: TopicId, name: &str) -> Card {
        let now = Utc::now();
        Card {
            id: CardId::new(),
            topic_id,
            name: name.to_string(),
            resource: String::new(),
            note: String::new(),
            progress: 0,
            starred: false,
            collapsed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cards_listed_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let t = topic(&db, alice.id, "Rust");

        for name in ["ownership", "borrowing", "lifetimes"] {
            db.create_card(&card(t.id, name)).unwrap();
        }

        let names: Vec<_> = db
            .list_cards_for_topic(t.id)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["ownership", "borrowing", "lifetimes"]);
    }

    #[test]
    fn topic_with_cards_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let now = Utc::now();
        let t = Topic {
            id: TopicId::new(),
            owner_id: alice.id,
            name: "Go".into(),
            collapsed: false,
            created_at: now,
            updated_at: now,
        };
        let good = card(t.id, "goroutines");
        let mut bad = card(t.id, "channels");
        bad.progress = 150;

        assert!(db.create_topic_with_cards(&t, &[good, bad]).is_err());
        assert!(matches!(db.get_topic(t.id), Err(StoreError::NotFound)));
        assert!(db.list_cards_for_owner(alice.id).unwrap().is_empty());
    }

    #[test]
    fn progress_check_constraint() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let t = topic(&db, alice.id, "Rust");
        let mut c = card(t.id, "traits");
        c.progress = -5;
        assert!(db.create_card(&c).is_err());
    }

    #[test]
    fn update_moves_and_delete_removes() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let a = topic(&db, alice.id, "A");
        let b = topic(&db, alice.id, "B");
        let mut c = card(a.id, "note");
        db.create_card(&c).unwrap();

        c.topic_id = b.id;
        c.progress = 40;
        c.starred = true;
        assert!(db.update_card(&c).unwrap());
        assert!(db.list_cards_for_topic(a.id).unwrap().is_empty());
        let moved = db.get_card(c.id).unwrap();
        assert_eq!(moved.topic_id, b.id);
        assert_eq!(moved.progress, 40);
        assert!(moved.starred);

        assert!(db.delete_card(c.id).unwrap());
        assert!(!db.delete_card(c.id).unwrap());
    }
}
