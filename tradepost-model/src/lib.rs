//! Core data model definitions shared across Tradepost crates.
#![allow(missing_docs)]

pub mod catalog;
pub mod ids;
pub mod listing;
pub mod query;
pub mod rbac;
pub mod schema;
pub mod user;

// Intentionally curated re-exports for downstream consumers.
pub use catalog::{
    Attribute, AttributeInput, AttributeValue, CategoriesWithChildren, Category,
    CategoryAttribute, grouped_categories,
};
pub use ids::{
    AttributeId, AttributeValueId, CategoryId, CommentId, ListingId, UserId,
};
pub use listing::{
    Comment, Condition, ConditionFilter, Listing, ListingAttribute, SortKey,
};
pub use query::{ListingQuery, PAGE_SIZE, PagedListings, filter_sort_page};
pub use rbac::{Access, Action, AuthContext, Entity, Permission, PermissionRequest, RoleGrant};
pub use schema::{
    FieldRule, ListingDraft, ListingSchema, MAX_IMAGES, MAX_IMAGE_BYTES,
    ValidationErrors,
};
pub use user::{LoginRequest, SignupRequest, User};
