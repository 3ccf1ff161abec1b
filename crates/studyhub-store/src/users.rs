//! CRUD operations for [`User`] records.

use rusqlite::params;

use studyhub_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{User, UserSummary};
use crate::row;

const USER_COLUMNS: &str = "id, username, email, password_hash, date_joined";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user. A username already taken (in any letter case)
    /// yields [`StoreError::Conflict`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, username, email, password_hash, date_joined)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    row::ts(&user.date_joined),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "username"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(StoreError::from_read)
    }

    /// Case-insensitive username lookup.
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .map_err(StoreError::from_read)
    }

    pub fn user_exists(&self, id: UserId) -> Result<bool> {
        let found: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Usernames containing `fragment` (case-insensitive), excluding `caller`
    /// and every user that already has a relationship of any status with
    /// `caller`, whichever side requested it.
    pub fn search_users(
        &self,
        caller: UserId,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<UserSummary>> {
        let pattern = format!("%{}%", escape_like(fragment));

        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username
             FROM users u
             WHERE u.id <> ?1
               AND u.username LIKE ?2 ESCAPE '\\'
               AND NOT EXISTS (
                   SELECT 1 FROM peer_relationships r
                   WHERE r.user_low = min(?1, u.id)
                     AND r.user_high = max(?1, u.id)
               )
             ORDER BY u.username COLLATE NOCASE ASC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![caller.to_string(), pattern, limit as i64],
            row_to_summary,
        )?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a user.  ON DELETE CASCADE removes their sessions, topics,
    /// cards, relationships, and every share they own or receive.
    pub fn delete_user(&self, id: UserId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row::uuid_at(row, 0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        date_joined: row::ts_at(row, 4)?,
    })
}

/// Map `(id, username)` starting at column 0.
pub(crate) fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummary> {
    summary_at(row, 0)
}

/// Map an `(id, username)` column pair starting at `idx`.
pub(crate) fn summary_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: UserId(row::uuid_at(row, idx)?),
        username: row.get(idx + 1)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn user(db: &Database, name: &str) -> User {
        let user = User {
            id: UserId::new(),
            username: name.to_string(),
            email: None,
            password_hash: "$argon2id$test".to_string(),
            date_joined: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user
    }

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        assert_eq!(db.get_user(alice.id).unwrap().username, "alice");
        assert_eq!(db.get_user_by_username("ALICE").unwrap().id, alice.id);
        assert!(db.user_exists(alice.id).unwrap());
        assert!(!db.user_exists(UserId::new()).unwrap());
        assert!(matches!(db.get_user(UserId::new()), Err(StoreError::NotFound)));
    }

    #[test]
    fn username_unique_ignoring_case() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "alice");

        let dup = User {
            id: UserId::new(),
            username: "Alice".into(),
            email: None,
            password_hash: String::new(),
            date_joined: Utc::now(),
        };
        assert!(matches!(db.create_user(&dup), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn search_is_case_insensitive_and_excludes_caller() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        user(&db, "Alicia");
        user(&db, "bob");

        let found = db.search_users(alice.id, "ALI", 10).unwrap();
        let names: Vec<_> = found.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["Alicia"]);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let db = Database::open_in_memory().unwrap();
        let me = user(&db, "me_me");
        user(&db, "a_b");
        user(&db, "axb");

        let found = db.search_users(me.id, "a_", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "a_b");
    }

    #[test]
    fn search_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        let me = user(&db, "searcher");
        for i in 0..15 {
            user(&db, &format!("student{i:02}"));
        }
        assert_eq!(db.search_users(me.id, "student", 10).unwrap().len(), 10);
    }
}
