use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use tradepost_model::rbac::AuthContext;

use crate::AppState;
use crate::auth::session::{SESSION_COOKIE, resolve_session};
use crate::infra::errors::AppError;

/// Raw session token of the authenticated request, kept for logout.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Resolve the session into `User` + `AuthContext` request extensions, or
/// reject with 401. Permissions are loaded fresh on every request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_session_token(&request)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let user = resolve_session(&state.db, &token)
        .await?
        .ok_or_else(|| AppError::unauthorized("Session is invalid or expired"))?;

    let context: AuthContext = state.db.users.get_auth_context(user.id).await?;

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(context);
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// The session token travels in the `tradepost_session` cookie; a bearer
/// header is accepted for non-browser clients.
fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(cookie_header) = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = session_cookie_value(cookie_header) {
            return Some(token);
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn session_cookie_value(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}
