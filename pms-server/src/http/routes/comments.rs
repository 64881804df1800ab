//! Task comment endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::ProjectAction;
use crate::db::{Comment, CommentRepo, CommentWithAuthor};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::models::{CommentBody, Paginated, Pagination, PaginationParams};

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// GET /tasks/{id}/comments - oldest first
async fn list_comments(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(task_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<CommentWithAuthor>>, ApiError> {
    access::task(&state, &current.user, task_id, ProjectAction::View).await?;

    let comments = CommentRepo::new(&state.pool)
        .list_for_task(task_id, Pagination::from(params))
        .await?;
    Ok(Json(comments))
}

/// POST /tasks/{id}/comments
async fn create_comment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    access::task(&state, &current.user, task_id, ProjectAction::Comment).await?;

    let body = CommentBody::new(&req.body)?;
    let comment = CommentRepo::new(&state.pool)
        .create(task_id, current.user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PATCH /comments/{id} - author only
async fn update_comment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let repo = CommentRepo::new(&state.pool);
    let comment = repo.get(id).await?;
    access::task(&state, &current.user, comment.task_id, ProjectAction::Comment).await?;

    if comment.author_id != current.user.id {
        return Err(ApiError::forbidden("only the author may edit a comment"));
    }

    let body = CommentBody::new(&req.body)?;
    Ok(Json(repo.update(id, &body).await?))
}

/// DELETE /comments/{id} - author, project manager or PMO
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = CommentRepo::new(&state.pool);
    let comment = repo.get(id).await?;
    let (_, access) = access::task(&state, &current.user, comment.task_id, ProjectAction::View).await?;

    if comment.author_id != current.user.id && !access.allows(ProjectAction::ManageProject) {
        return Err(ApiError::forbidden(
            "only the author or a project manager may delete a comment",
        ));
    }

    repo.delete(id).await?;

    tracing::info!(comment_id = %id, task_id = %comment.task_id, by = %current.user.id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Comment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/tasks/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{id}", patch(update_comment).delete(delete_comment))
}
