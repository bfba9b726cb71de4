//! The authorization gate.
//!
//! Handlers state what they need as a permission descriptor
//! (`action:entity` or `action:entity:accessA,accessB`) and hand over the
//! request's resolved [`AuthContext`].

use tradepost_model::rbac::{AuthContext, PermissionRequest};

use crate::infra::errors::{AppError, AppResult};

/// Reject with 403 unless the context holds a matching permission.
pub fn require_permission(context: &AuthContext, descriptor: &str) -> AppResult<()> {
    let request = PermissionRequest::parse(descriptor)
        .map_err(|e| AppError::internal(e.to_string()))?;

    if context.allows(&request) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Required permission: {descriptor}"
        )))
    }
}
