//! Store access.
//!
//! Each concern gets its own repository trait with a Postgres implementation;
//! [`Database`] bundles them for the app state. Traits are mocked in service
//! tests, so nothing above this layer needs a live database to be exercised.

pub mod postgres;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use sqlx::PgPool;

use tradepost_model::{
    Attribute, AttributeId, AuthContext, Category, CategoryAttribute, CategoryId, Comment,
    Listing, ListingDraft, ListingId, User, UserId,
};

use self::postgres::{
    PostgresCategoryRepository, PostgresCommentRepository, PostgresListingRepository,
    PostgresSessionRepository, PostgresUserRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Conflict(String),
    #[error("invalid row: {0}")]
    Decode(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// A stored session, still subject to expiry/revocation checks.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// A listing with everything its detail page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub category: Category,
    pub attributes: Vec<ListingAttributeDetail>,
}

/// A realized attribute value joined with its attribute metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ListingAttributeDetail {
    pub attribute: Attribute,
    pub value: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the user, its credential row, and its initial role grant in one
    /// transaction. Fails with `Conflict` when the email is taken.
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, DbError>;

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, DbError>;

    /// Roles and flattened permissions, resolved fresh on every call.
    async fn get_auth_context(&self, id: UserId) -> Result<AuthContext, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    async fn lookup_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, DbError>;

    async fn revoke_session(&self, token_hash: &str) -> Result<(), DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, DbError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, DbError>;

    /// Attributes applicable to the category, ordered by attribute id, with
    /// allowed values for select attributes. An unknown category yields an
    /// empty set.
    async fn attributes_for_category(
        &self,
        id: CategoryId,
    ) -> Result<Vec<CategoryAttribute>, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn listings_for_category(&self, id: CategoryId) -> Result<Vec<Listing>, DbError>;

    /// Realized attribute values for a batch of listings.
    async fn attribute_values_for_listings(
        &self,
        ids: &[ListingId],
    ) -> Result<HashMap<ListingId, BTreeMap<AttributeId, String>>, DbError>;

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, DbError>;

    async fn get_listing_detail(&self, id: ListingId) -> Result<Option<ListingDetail>, DbError>;

    async fn listings_for_owner(&self, owner_id: UserId) -> Result<Vec<Listing>, DbError>;

    async fn latest_listings(&self, limit: i64) -> Result<Vec<Listing>, DbError>;

    async fn search_listings(&self, query: &str) -> Result<Vec<Listing>, DbError>;

    /// Insert the listing row, its category row, and its attribute rows in
    /// one transaction.
    async fn create_listing(
        &self,
        draft: &ListingDraft,
        owner_id: UserId,
        images: &[String],
    ) -> Result<ListingId, DbError>;

    /// Overwrite the mutable fields and replace the category/attribute
    /// associations by diffing against the current rows, all in one
    /// transaction.
    async fn update_listing(
        &self,
        id: ListingId,
        draft: &ListingDraft,
        images: &[String],
    ) -> Result<(), DbError>;

    /// Returns false when no such listing existed. Associations cascade.
    async fn delete_listing(&self, id: ListingId) -> Result<bool, DbError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn comments_for_listing(&self, id: ListingId) -> Result<Vec<Comment>, DbError>;
}

/// Repository bundle handed to handlers via [`crate::AppState`].
#[derive(Clone)]
pub struct Database {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub listings: Arc<dyn ListingRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

impl Database {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
            categories: Arc::new(PostgresCategoryRepository::new(pool.clone())),
            listings: Arc::new(PostgresListingRepository::new(pool.clone())),
            comments: Arc::new(PostgresCommentRepository::new(pool)),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
