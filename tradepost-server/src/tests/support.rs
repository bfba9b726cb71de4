//! Shared fixtures: a mock-backed [`Database`], a temp-dir image store, and
//! builders for the domain records the tests shuffle around.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

use tradepost_model::rbac::{Access, Action, AuthContext, Entity, Permission, RoleGrant};
use tradepost_model::{
    Attribute, AttributeId, AttributeInput, AttributeValue, AttributeValueId, Category,
    CategoryAttribute, CategoryId, Condition, Listing, ListingId, User, UserId,
};

use crate::AppState;
use crate::auth::session::hash_session_token;
use crate::db::{
    Database, MockCategoryRepository, MockCommentRepository, MockListingRepository,
    MockSessionRepository, MockUserRepository, SessionRecord,
};
use crate::images::store::ImageStore;
use crate::infra::config::Config;

/// Raw session token used by authenticated test requests.
pub const TEST_TOKEN: &str = "test-session-token";

pub struct TestDb {
    pub users: MockUserRepository,
    pub sessions: MockSessionRepository,
    pub categories: MockCategoryRepository,
    pub listings: MockListingRepository,
    pub comments: MockCommentRepository,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            users: MockUserRepository::new(),
            sessions: MockSessionRepository::new(),
            categories: MockCategoryRepository::new(),
            listings: MockListingRepository::new(),
            comments: MockCommentRepository::new(),
        }
    }

    /// Wire the session/user/context lookups the auth middleware performs for
    /// `TEST_TOKEN`.
    pub fn authenticate(&mut self, user: User, context: AuthContext) {
        let expected_hash = hash_session_token(TEST_TOKEN);
        let user_id = user.id;

        self.sessions
            .expect_lookup_session()
            .withf(move |hash| hash == expected_hash)
            .returning(move |_| {
                Ok(Some(SessionRecord {
                    user_id,
                    expires_at: Utc::now() + Duration::hours(1),
                    revoked: false,
                }))
            });

        self.users
            .expect_get_user_by_id()
            .returning(move |_| Ok(Some(user.clone())));

        self.users
            .expect_get_auth_context()
            .returning(move |_| Ok(context.clone()));
    }

    pub fn into_database(self) -> Database {
        Database {
            users: Arc::new(self.users),
            sessions: Arc::new(self.sessions),
            categories: Arc::new(self.categories),
            listings: Arc::new(self.listings),
            comments: Arc::new(self.comments),
        }
    }
}

pub fn test_state(db: TestDb, images_dir: &TempDir) -> AppState {
    AppState::new(
        db.into_database(),
        ImageStore::new(images_dir.path()),
        Config::default(),
    )
}

pub fn user(id: i64) -> User {
    User {
        id: UserId(id),
        email: format!("user{id}@example.com"),
        name: format!("User {id}"),
        avatar_url: None,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn context(user_id: i64, role: &str, permissions: &[(Action, Entity, Access)]) -> AuthContext {
    AuthContext {
        user_id: UserId(user_id),
        roles: vec![RoleGrant {
            name: role.to_string(),
            permissions: permissions
                .iter()
                .map(|(action, entity, access)| Permission {
                    action: *action,
                    entity: *entity,
                    access: *access,
                })
                .collect(),
        }],
    }
}

/// The standard `user` role grants, as seeded.
pub fn seller_context(user_id: i64) -> AuthContext {
    context(
        user_id,
        "user",
        &[
            (Action::Create, Entity::Listing, Access::Own),
            (Action::Read, Entity::Listing, Access::Any),
            (Action::Update, Entity::Listing, Access::Own),
            (Action::Delete, Entity::Listing, Access::Own),
        ],
    )
}

/// Read-only grants, as seeded for `unverified` and `demo`.
pub fn read_only_context(user_id: i64) -> AuthContext {
    context(
        user_id,
        "unverified",
        &[(Action::Read, Entity::Listing, Access::Any)],
    )
}

pub fn listing(id: i64, owner_id: i64, sum: i64, condition: Condition) -> Listing {
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Listing {
        id: ListingId(id),
        title: format!("Listing {id}"),
        description: "A fine item".to_string(),
        sum,
        condition,
        images: vec![],
        owner_id: UserId(owner_id),
        created_at: base - Duration::hours(id),
        updated_at: base - Duration::hours(id),
    }
}

pub fn child_category(id: i64, name: &str) -> Category {
    Category {
        id: CategoryId(id),
        name: name.to_string(),
        parent_id: Some(CategoryId(1)),
    }
}

pub fn number_attribute(id: i64, name: &str, unit: &str) -> CategoryAttribute {
    CategoryAttribute {
        attribute: Attribute {
            id: AttributeId(id),
            name: name.to_string(),
            slug: name.to_lowercase(),
            input_type: AttributeInput::Number,
            unit: Some(unit.to_string()),
        },
        values: vec![],
    }
}

pub fn select_attribute(id: i64, name: &str, allowed: &[&str]) -> CategoryAttribute {
    CategoryAttribute {
        attribute: Attribute {
            id: AttributeId(id),
            name: name.to_string(),
            slug: name.to_lowercase(),
            input_type: AttributeInput::Select,
            unit: None,
        },
        values: allowed
            .iter()
            .enumerate()
            .map(|(i, value)| AttributeValue {
                id: AttributeValueId(i as i64 + 1),
                attribute_id: AttributeId(id),
                value: value.to_string(),
            })
            .collect(),
    }
}
