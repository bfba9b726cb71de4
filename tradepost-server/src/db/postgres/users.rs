use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tradepost_model::rbac::{AuthContext, Permission, RoleGrant};
use tradepost_model::{User, UserId};

use crate::db::{DbError, UserRepository};

use super::map_unique_violation;

#[derive(Clone, Debug)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn map_user_row(r: UserRow) -> User {
    User {
        id: UserId(r.id),
        email: r.email,
        name: r.name,
        avatar_url: r.avatar_url,
        created_at: r.created_at,
        updated_at: r.updated_at,
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    role_name: String,
    action: Option<String>,
    entity: Option<String>,
    access: Option<String>,
}

fn map_grant_row(r: &GrantRow) -> Result<Option<Permission>, DbError> {
    let (Some(action), Some(entity), Some(access)) = (&r.action, &r.entity, &r.access) else {
        // Role without permissions: the LEFT JOIN produced an empty row.
        return Ok(None);
    };

    let parse = |what: &str, err: String| {
        DbError::Decode(format!("permission {what} for role {}: {err}", r.role_name))
    };

    Ok(Some(Permission {
        action: action.parse().map_err(|e| parse("action", e))?,
        entity: entity.parse().map_err(|e| parse("entity", e))?,
        access: access.parse().map_err(|e| parse("access", e))?,
    }))
}

const SELECT_USER: &str =
    "SELECT id, email, name, avatar_url, created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            RETURNING id, email, name, avatar_url, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Email already registered"))?;

        sqlx::query("INSERT INTO passwords (user_id, hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        let granted = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2",
        )
        .bind(row.id)
        .bind(role)
        .execute(&mut *tx)
        .await?;

        if granted.rows_affected() == 0 {
            return Err(DbError::Decode(format!("role {role} does not exist")));
        }

        tx.commit().await?;
        Ok(map_user_row(row))
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(map_user_row))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(map_user_row))
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, DbError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT hash FROM passwords WHERE user_id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn get_auth_context(&self, id: UserId) -> Result<AuthContext, DbError> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT r.name AS role_name, p.action, p.entity, p.access
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            ORDER BY r.name, p.id
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut roles: Vec<RoleGrant> = Vec::new();
        for row in &rows {
            if roles.last().map(|r| r.name.as_str()) != Some(row.role_name.as_str()) {
                roles.push(RoleGrant {
                    name: row.role_name.clone(),
                    permissions: Vec::new(),
                });
            }
            if let (Some(permission), Some(role)) = (map_grant_row(row)?, roles.last_mut()) {
                role.permissions.push(permission);
            }
        }

        Ok(AuthContext { user_id: id, roles })
    }
}
