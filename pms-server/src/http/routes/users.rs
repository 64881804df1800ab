//! User administration endpoints (writes require PMO)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::hash_password;
use super::SearchQuery;
use crate::auth::{validate_password, Action};
use crate::db::{SessionRepo, User, UserChanges, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::models::{Email, Name, Paginated, Pagination, PaginationParams, Role};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

/// GET /users
async fn list_users(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(query): Query<SearchQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<User>>, ApiError> {
    let page = Pagination::from(params);
    let users = UserRepo::new(&state.pool)
        .list(query.q.as_deref(), page)
        .await?;
    Ok(Json(users))
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    current.require(Action::ManageUsers)?;

    let email = Email::new(&req.email)?;
    let display_name = Name::for_field(&req.display_name, "display_name")?;
    validate_password(&req.password)?;
    let password_hash = hash_password(&state, req.password).await?;

    let user = UserRepo::new(&state.pool)
        .create(&email, &display_name, req.role, &password_hash)
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, by = %current.user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(UserRepo::new(&state.pool).get(id).await?))
}

/// PATCH /users/{id}
///
/// Deactivating a user ends all of their sessions.
async fn update_user(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    current.require(Action::ManageUsers)?;

    let display_name = req
        .display_name
        .as_deref()
        .map(|name| Name::for_field(name, "display_name"))
        .transpose()?;

    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&state, password).await?)
        }
        None => None,
    };

    let user = UserRepo::new(&state.pool)
        .update(
            id,
            UserChanges {
                display_name,
                role: req.role,
                active: req.active,
                password_hash,
            },
        )
        .await?;

    if !user.active {
        let ended = SessionRepo::new(&state.pool).delete_for_user(id).await?;
        tracing::info!(user_id = %id, sessions = ended, "user deactivated");
    }

    Ok(Json(user))
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).patch(update_user))
}
