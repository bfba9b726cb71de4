use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::info;

use tradepost_model::rbac::{AuthContext, roles};
use tradepost_model::{LoginRequest, SignupRequest, User};

use crate::AppState;
use crate::auth::middleware::SessionToken;
use crate::auth::session::{SESSION_COOKIE, create_session, destroy_session};
use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Also set as the session cookie; returned for non-browser clients.
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(flatten)]
    pub context: AuthContext,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<Response> {
    request.validate().map_err(AppError::bad_request)?;

    let email = request.email.trim().to_lowercase();
    if state
        .db
        .users
        .get_user_by_email(&email)
        .await?
        .is_some()
    {
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&request.password)?;
    let user = state
        .db
        .users
        .create_user(&email, request.name.trim(), &password_hash, roles::USER)
        .await?;

    info!("User registered: {} ({})", user.email, user.id);

    let token = create_session(&state.db, &user, state.config.auth.session_ttl_hours).await?;
    Ok(auth_response(&state, token, user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .db
        .users
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    let password_hash = state
        .db
        .users
        .get_password_hash(user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    verify_password(&request.password, &password_hash)?;

    let token = create_session(&state.db, &user, state.config.auth.session_ttl_hours).await?;
    Ok(auth_response(&state, token, user))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> AppResult<Response> {
    destroy_session(&state.db, &token.0).await?;

    // Expire the cookie on the way out.
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Ok(([(header::SET_COOKIE, cookie)], Json(serde_json::json!({}))).into_response())
}

pub async fn me(
    Extension(user): Extension<User>,
    Extension(context): Extension<AuthContext>,
) -> Json<MeResponse> {
    Json(MeResponse { user, context })
}

fn auth_response(state: &AppState, token: String, user: User) -> Response {
    let max_age = state.config.auth.session_ttl_hours * 3600;
    let cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    (
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse { token, user }),
    )
        .into_response()
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AppError::internal("Failed to hash password"))?
        .to_string();

    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<()> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::internal("Invalid password hash"))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::unauthorized("Invalid email or password"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(verify_password("wrong horse", &hash).is_err());
    }
}
