use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tradepost_model::{Comment, CommentId, ListingId, UserId};

use crate::db::{CommentRepository, DbError};

#[derive(Clone, Debug)]
pub struct PostgresCommentRepository {
    pool: PgPool,
}

impl PostgresCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    text: String,
    user_id: i64,
    listing_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn comments_for_listing(&self, id: ListingId) -> Result<Vec<Comment>, DbError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, text, user_id, listing_id, created_at, updated_at
            FROM comments
            WHERE listing_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Comment {
                id: CommentId(r.id),
                text: r.text,
                user_id: UserId(r.user_id),
                listing_id: ListingId(r.listing_id),
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect())
    }
}
