//! Accounts and bearer tokens.
//!
//! Passwords are stored as Argon2 PHC strings. Tokens are random bytes
//! handed to the client once; the store only ever sees their BLAKE3
//! digest.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use studyhub_shared::constants::TOKEN_BYTES;
use studyhub_shared::{validate, UserId};
use studyhub_store::{Database, StoreError, User};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A freshly issued bearer token. `access` is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access: String,
    pub expires_at: DateTime<Utc>,
}

/// Validate a registration and hash its password. Touches no database, so
/// callers can run the Argon2 work without holding a connection.
pub fn prepare_account(reg: &Registration) -> CoreResult<User> {
    let username = reg.username.trim();
    validate::username(username)?;
    validate::password(&reg.password)?;

    let email = reg
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    Ok(User {
        id: UserId::new(),
        username: username.to_string(),
        email,
        password_hash: hash_password(&reg.password)?,
        date_joined: Utc::now(),
    })
}

/// Store an account built by [`prepare_account`].
pub fn create_account(db: &Database, user: User) -> CoreResult<User> {
    match db.create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(CoreError::Conflict(
                "A user with that username already exists".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

pub fn register(db: &Database, reg: &Registration) -> CoreResult<User> {
    create_account(db, prepare_account(reg)?)
}

/// The account a login names. Unknown usernames report `Unauthorized`.
pub fn find_account(db: &Database, username: &str) -> CoreResult<User> {
    match db.get_user_by_username(username.trim()) {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => Err(CoreError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Verify `password` against the account's stored hash.
pub fn check_password(user: &User, password: &str) -> CoreResult<UserId> {
    if !verify_password(&user.password_hash, password) {
        debug!(user_id = %user.id, "password mismatch");
        return Err(CoreError::Unauthorized);
    }
    Ok(user.id)
}

/// Issue a token for `user` lasting `ttl`. Expired sessions are purged on
/// the way.
pub fn open_session(db: &Database, user: UserId, ttl: Duration) -> CoreResult<IssuedToken> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| CoreError::Internal(format!("token lifetime {ttl} is out of range")))?;

    let purged = db.purge_expired_sessions(now)?;
    if purged > 0 {
        debug!(purged, "expired sessions removed");
    }

    let mut raw = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    let access = hex::encode(raw);

    db.insert_session(&token_digest(&access), user, now, expires_at)?;

    info!(user_id = %user, %expires_at, "session opened");
    Ok(IssuedToken { access, expires_at })
}

/// Check credentials and open a session lasting `ttl`.
///
/// Unknown usernames and wrong passwords fail identically.
pub fn login(db: &Database, username: &str, password: &str, ttl: Duration) -> CoreResult<IssuedToken> {
    let user = find_account(db, username)?;
    let id = check_password(&user, password)?;
    open_session(db, id, ttl)
}

/// The user behind an unexpired bearer token.
pub fn resolve(db: &Database, token: &str) -> CoreResult<UserId> {
    db.session_user(&token_digest(token), Utc::now())?
        .ok_or(CoreError::Unauthorized)
}

pub fn logout(db: &Database, token: &str) -> CoreResult<()> {
    if !db.delete_session(&token_digest(token))? {
        return Err(CoreError::Unauthorized);
    }
    debug!("session closed");
    Ok(())
}

pub fn profile(db: &Database, caller: UserId) -> CoreResult<User> {
    match db.get_user(caller) {
        Ok(user) => Ok(user),
        // the account vanished under a live token
        Err(StoreError::NotFound) => Err(CoreError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

/// Delete the caller's account. Topics, cards, shares in both directions,
/// relationships, sessions and access rows go with it.
pub fn delete_account(db: &Database, caller: UserId) -> CoreResult<()> {
    if !db.delete_user(caller)? {
        return Err(CoreError::Unauthorized);
    }
    info!(user_id = %caller, "account deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hash_password(password: &str) -> CoreResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| CoreError::Internal(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Internal(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is unreadable");
            false
        }
    }
}

fn token_digest(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
