//! Decision log endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::ProjectAction;
use crate::db::{Decision, DecisionChanges, DecisionRepo, NewDecision};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::patch::{merge, nullable};
use crate::http::server::AppState;
use crate::models::{
    description, optional_text, DecisionStatus, Paginated, Pagination, PaginationParams, Title,
    ValidationError,
};

const MAX_RATIONALE_LEN: usize = 8 * 1024;

#[derive(Deserialize)]
pub struct DecisionFilter {
    pub status: Option<DecisionStatus>,
}

#[derive(Deserialize)]
pub struct CreateDecisionRequest {
    pub title: String,
    pub description: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDecisionRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub rationale: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: DecisionStatus,
    pub rationale: Option<String>,
}

fn rationale(s: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text(s, "rationale", MAX_RATIONALE_LEN)
}

/// GET /projects/{id}/decisions - newest first
async fn list_decisions(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(filter): Query<DecisionFilter>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Decision>>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let decisions = DecisionRepo::new(&state.pool)
        .list(project_id, filter.status, Pagination::from(params))
        .await?;
    Ok(Json(decisions))
}

/// POST /projects/{id}/decisions - always starts as proposed
async fn create_decision(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateDecisionRequest>,
) -> Result<(StatusCode, Json<Decision>), ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::ProposeDecision).await?;

    let new = NewDecision {
        title: Title::new(&req.title)?,
        description: description(req.description.as_deref())?,
        rationale: rationale(req.rationale.as_deref())?,
    };
    let decision = DecisionRepo::new(&state.pool)
        .create(project_id, current.user.id, new)
        .await?;

    tracing::info!(decision_id = %decision.id, %project_id, "decision proposed");
    Ok((StatusCode::CREATED, Json(decision)))
}

/// GET /decisions/{id}
async fn get_decision(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Decision>, ApiError> {
    let decision = DecisionRepo::new(&state.pool).get(id).await?;
    access::project(&state, &current.user, decision.project_id, ProjectAction::View).await?;
    Ok(Json(decision))
}

/// PATCH /decisions/{id} - text fields only
async fn update_decision(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDecisionRequest>,
) -> Result<Json<Decision>, ApiError> {
    let repo = DecisionRepo::new(&state.pool);
    let decision = repo.get(id).await?;
    access::project(&state, &current.user, decision.project_id, ProjectAction::ProposeDecision).await?;

    let changes = DecisionChanges {
        title: Title::new(req.title.as_deref().unwrap_or(&decision.title))?,
        description: description(merge(req.description, decision.description).as_deref())?,
        rationale: rationale(merge(req.rationale, decision.rationale).as_deref())?,
    };
    Ok(Json(repo.update(id, changes).await?))
}

/// POST /decisions/{id}/transition
///
/// Disallowed transitions answer 409.
async fn transition_decision(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Decision>, ApiError> {
    let repo = DecisionRepo::new(&state.pool);
    let decision = repo.get(id).await?;
    access::project(&state, &current.user, decision.project_id, ProjectAction::DecideDecision).await?;

    let rationale = rationale(req.rationale.as_deref())?;
    let updated = repo
        .transition(id, req.status, current.user.id, rationale)
        .await?;

    tracing::info!(decision_id = %id, from = %decision.status, to = %updated.status, by = %current.user.id, "decision status changed");
    Ok(Json(updated))
}

/// DELETE /decisions/{id}
async fn delete_decision(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = DecisionRepo::new(&state.pool);
    let decision = repo.get(id).await?;
    access::project(&state, &current.user, decision.project_id, ProjectAction::ManageProject).await?;

    repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Decision routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects/{id}/decisions",
            get(list_decisions).post(create_decision),
        )
        .route(
            "/decisions/{id}",
            get(get_decision).patch(update_decision).delete(delete_decision),
        )
        .route("/decisions/{id}/transition", post(transition_decision))
}
