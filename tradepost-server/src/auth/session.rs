//! Opaque session tokens.
//!
//! The raw token is random, handed to the client once, and never stored:
//! the sessions table keys on its SHA-256 hash. Expiry and revocation are
//! checked on every lookup.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tradepost_model::User;

use crate::db::Database;
use crate::infra::errors::{AppError, AppResult};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "tradepost_session";

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a session for the user and return the raw token.
pub async fn create_session(db: &Database, user: &User, ttl_hours: i64) -> AppResult<String> {
    let token = generate_session_token();
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    db.sessions
        .create_session(&hash_session_token(&token), user.id, expires_at)
        .await
        .map_err(|_| AppError::internal("Failed to create session"))?;

    Ok(token)
}

/// Resolve a raw token to its user. Unknown, expired, and revoked sessions
/// all come back as `None`.
pub async fn resolve_session(db: &Database, token: &str) -> AppResult<Option<User>> {
    let record = db
        .sessions
        .lookup_session(&hash_session_token(token))
        .await?;

    let Some(record) = record else {
        return Ok(None);
    };

    if record.revoked || record.expires_at < Utc::now() {
        return Ok(None);
    }

    Ok(db.users.get_user_by_id(record.user_id).await?)
}

/// Revoke the session behind a raw token.
pub async fn destroy_session(db: &Database, token: &str) -> AppResult<()> {
    db.sessions
        .revoke_session(&hash_session_token(token))
        .await?;
    Ok(())
}
