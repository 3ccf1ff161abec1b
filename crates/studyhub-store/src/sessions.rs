use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use studyhub_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::row;

impl Database {
    pub fn insert_session(
        &self,
        token_digest: &str,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sessions (token_digest, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    token_digest,
                    user_id.to_string(),
                    row::ts(&created_at),
                    row::ts(&expires_at),
                ],
            )
            .map_err(|e| StoreError::from_write(e, "session"))?;
        Ok(())
    }

    /// The user owning an unexpired session, if any.
    pub fn session_user(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<UserId>> {
        let found = self
            .conn()
            .query_row(
                "SELECT user_id FROM sessions WHERE token_digest = ?1 AND expires_at > ?2",
                params![token_digest, row::ts(&now)],
                |row| row::uuid_at(row, 0),
            )
            .optional()?;
        Ok(found.map(UserId))
    }

    pub fn delete_session(&self, token_digest: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE token_digest = ?1",
            params![token_digest],
        )?;
        Ok(affected > 0)
    }

    /// Drop every session that expired at or before `now`.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![row::ts(&now)],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::user;
    use chrono::Duration;

    #[test]
    fn expired_sessions_do_not_resolve() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let now = Utc::now();

        db.insert_session("live", alice.id, now, now + Duration::hours(1))
            .unwrap();
        db.insert_session("stale", alice.id, now - Duration::hours(2), now - Duration::hours(1))
            .unwrap();

        assert_eq!(db.session_user("live", now).unwrap(), Some(alice.id));
        assert_eq!(db.session_user("stale", now).unwrap(), None);
        assert_eq!(db.session_user("missing", now).unwrap(), None);

        assert_eq!(db.purge_expired_sessions(now).unwrap(), 1);
        assert!(db.delete_session("live").unwrap());
        assert!(!db.delete_session("live").unwrap());
    }

    #[test]
    fn sessions_go_with_their_user() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let now = Utc::now();
        db.insert_session("tok", alice.id, now, now + Duration::hours(1))
            .unwrap();

        db.delete_user(alice.id).unwrap();
        assert_eq!(db.session_user("tok", now).unwrap(), None);
    }
}
