//! Login, logout and password changes

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_token, hash_token, validate_password, SESSION_COOKIE};
use crate::db::{SessionRepo, User, UserChanges, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    /// Bearer token; the same value is set as the session cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Verify a password off the async runtime.
async fn verify_password(state: &AppState, password: String, stored: String) -> Result<bool, ApiError> {
    let passwords = state.passwords.clone();
    Ok(tokio::task::spawn_blocking(move || passwords.verify(&password, &stored)).await?)
}

/// Hash a password off the async runtime.
pub(crate) async fn hash_password(state: &AppState, password: String) -> Result<String, ApiError> {
    let passwords = state.passwords.clone();
    Ok(tokio::task::spawn_blocking(move || passwords.hash(&password)).await??)
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = UserRepo::new(&state.pool)
        .find_by_email(&req.email)
        .await?
        .filter(|user| user.active);

    let Some(user) = user else {
        let passwords = state.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.reject_unknown(&req.password)).await?;
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(&state, req.password, user.password_hash.clone()).await? {
        tracing::warn!(user_id = %user.id, "login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let ttl = state
        .config
        .auth
        .session_ttl()
        .ok_or_else(|| ApiError::internal("auth.session_ttl_hours is out of range"))?;

    let sessions = SessionRepo::new(&state.pool);
    let now = Utc::now();
    let purged = sessions.purge_expired(now).await?;

    let token = generate_token();
    let expires_at = now + ttl;
    sessions.create(&hash_token(&token), user.id, expires_at).await?;

    tracing::info!(user_id = %user.id, purged, "user logged in");

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(state.config.auth.cookie_secure);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            expires_at,
            user,
        }),
    ))
}

/// POST /auth/logout
async fn logout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    SessionRepo::new(&state.pool)
        .delete(&current.token_hash)
        .await?;

    tracing::info!(user_id = %current.user.id, "user logged out");
    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    ))
}

/// GET /auth/me
async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// POST /auth/password
async fn change_password(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    validate_password(&req.new_password)?;

    let user = current.user;
    if !verify_password(&state, req.current_password, user.password_hash.clone()).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let password_hash = hash_password(&state, req.new_password).await?;
    UserRepo::new(&state.pool)
        .update(
            user.id,
            UserChanges {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
}
