//! Role-Based Access Control for Tradepost.
//!
//! Users are assigned roles, and roles grant permissions. A permission is the
//! triple `(action, entity, access)` where access distinguishes operating on
//! one's own records (`own`) from anyone's (`any`). Checks are expressed as
//! descriptor strings:
//!
//! ```
//! use tradepost_model::rbac::PermissionRequest;
//!
//! let request = PermissionRequest::parse("update:listing:own,any").unwrap();
//! assert_eq!(request.access.len(), 2);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// What is being done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// What it is being done to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    User,
    Listing,
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Entity::User),
            "listing" => Ok(Entity::Listing),
            other => Err(format!("unknown entity: {other}")),
        }
    }
}

/// Whose records the permission covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Own,
    Any,
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "own" => Ok(Access::Own),
            "any" => Ok(Access::Any),
            other => Err(format!("unknown access: {other}")),
        }
    }
}

/// A granted permission triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub entity: Entity,
    pub access: Access,
}

/// A role with its granted permissions, as resolved for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub name: String,
    pub permissions: Vec<Permission>,
}

/// Everything the authorization gate needs about the requester, resolved from
/// the store once per request and never cached across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub roles: Vec<RoleGrant>,
}

impl AuthContext {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.roles.iter().flat_map(|r| r.permissions.iter())
    }

    /// Linear scan over the flattened permission set: the action and entity
    /// must match exactly, and the access must be in the requested set
    /// (an empty set means any access satisfies the request).
    pub fn allows(&self, request: &PermissionRequest) -> bool {
        self.permissions().any(|p| {
            p.action == request.action
                && p.entity == request.entity
                && (request.access.is_empty() || request.access.contains(&p.access))
        })
    }
}

/// A parsed permission descriptor: `action:entity` or
/// `action:entity:accessA,accessB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub action: Action,
    pub entity: Entity,
    /// Empty means no access constraint.
    pub access: Vec<Access>,
}

impl PermissionRequest {
    pub fn parse(descriptor: &str) -> Result<Self, InvalidPermission> {
        let invalid = || InvalidPermission(descriptor.to_string());

        let mut parts = descriptor.splitn(3, ':');
        let action = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;
        let entity = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;

        let access = match parts.next() {
            None => Vec::new(),
            Some(list) => list
                .split(',')
                .map(|a| a.parse().map_err(|_| invalid()))
                .collect::<Result<Vec<Access>, _>>()?,
        };

        Ok(Self {
            action,
            entity,
            access,
        })
    }
}

/// A descriptor string that does not name a known permission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission descriptor: {0}")]
pub struct InvalidPermission(pub String);

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        let entity = match self.entity {
            Entity::User => "user",
            Entity::Listing => "listing",
        };
        let access = match self.access {
            Access::Own => "own",
            Access::Any => "any",
        };
        write!(f, "{action}:{entity}:{access}")
    }
}

/// Well-known role names.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const USER: &str = "user";
    pub const UNVERIFIED: &str = "unverified";
    pub const DEMO: &str = "demo";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(permissions: Vec<Permission>) -> AuthContext {
        AuthContext {
            user_id: UserId(1),
            roles: vec![RoleGrant {
                name: "user".to_string(),
                permissions,
            }],
        }
    }

    fn perm(action: Action, entity: Entity, access: Access) -> Permission {
        Permission {
            action,
            entity,
            access,
        }
    }

    #[test]
    fn test_parse_descriptor() {
        let request = PermissionRequest::parse("create:listing").unwrap();
        assert_eq!(request.action, Action::Create);
        assert_eq!(request.entity, Entity::Listing);
        assert!(request.access.is_empty());

        let request = PermissionRequest::parse("update:listing:own,any").unwrap();
        assert_eq!(request.access, vec![Access::Own, Access::Any]);

        assert!(PermissionRequest::parse("").is_err());
        assert!(PermissionRequest::parse("create").is_err());
        assert!(PermissionRequest::parse("create:server").is_err());
        assert!(PermissionRequest::parse("touch:listing").is_err());
        assert!(PermissionRequest::parse("create:listing:some").is_err());
    }

    #[test]
    fn test_allows_exact_match() {
        let ctx = context(vec![perm(Action::Create, Entity::Listing, Access::Own)]);

        assert!(ctx.allows(&PermissionRequest::parse("create:listing:own").unwrap()));
        assert!(!ctx.allows(&PermissionRequest::parse("create:listing:any").unwrap()));
        assert!(!ctx.allows(&PermissionRequest::parse("delete:listing:own").unwrap()));
        assert!(!ctx.allows(&PermissionRequest::parse("create:user:own").unwrap()));
    }

    #[test]
    fn test_allows_access_set() {
        let ctx = context(vec![perm(Action::Update, Entity::Listing, Access::Any)]);

        // Requesting own,any is satisfied by an `any` grant.
        assert!(ctx.allows(&PermissionRequest::parse("update:listing:own,any").unwrap()));
        // No access constraint matches any grant for the action/entity pair.
        assert!(ctx.allows(&PermissionRequest::parse("update:listing").unwrap()));
    }

    #[test]
    fn test_allows_scans_all_roles() {
        let ctx = AuthContext {
            user_id: UserId(7),
            roles: vec![
                RoleGrant {
                    name: "unverified".to_string(),
                    permissions: vec![perm(Action::Read, Entity::Listing, Access::Any)],
                },
                RoleGrant {
                    name: "user".to_string(),
                    permissions: vec![perm(Action::Delete, Entity::Listing, Access::Own)],
                },
            ],
        };

        assert!(ctx.allows(&PermissionRequest::parse("delete:listing:own").unwrap()));
        assert!(ctx.has_role("unverified"));
        assert!(!ctx.has_role("admin"));
        assert_eq!(ctx.permissions().count(), 2);
    }
}
