use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tradepost_model::UserId;

use crate::db::{DbError, SessionRecord, SessionRepository};

#[derive(Clone, Debug)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: i64,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id.as_i64())
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lookup_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, DbError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT user_id, expires_at, revoked FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SessionRecord {
            user_id: UserId(r.user_id),
            expires_at: r.expires_at,
            revoked: r.revoked,
        }))
    }

    async fn revoke_session(&self, token_hash: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE sessions SET revoked = TRUE WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
