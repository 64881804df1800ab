//! Phase endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::ProjectAction;
use crate::db::{Phase, PhaseFields, PhaseRepo};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::patch::{merge, nullable};
use crate::http::server::AppState;
use crate::models::{check_range, description, Name, PhaseStatus};

#[derive(Deserialize)]
pub struct CreatePhaseRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: PhaseStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdatePhaseRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<PhaseStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<NaiveDate>>,
}

fn fields(
    name: &str,
    desc: Option<&str>,
    status: PhaseStatus,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<PhaseFields, ApiError> {
    check_range(start_date, end_date, "start_date", "end_date")?;
    Ok(PhaseFields {
        name: Name::new(name)?,
        description: description(desc)?,
        status,
        start_date,
        end_date,
    })
}

/// GET /projects/{id}/phases
async fn list_phases(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Phase>>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;
    Ok(Json(PhaseRepo::new(&state.pool).list(project_id).await?))
}

/// POST /projects/{id}/phases - appended after the existing phases
async fn create_phase(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreatePhaseRequest>,
) -> Result<(StatusCode, Json<Phase>), ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::ManagePhases).await?;

    let fields = fields(
        &req.name,
        req.description.as_deref(),
        req.status,
        req.start_date,
        req.end_date,
    )?;
    let phase = PhaseRepo::new(&state.pool).create(project_id, fields).await?;

    tracing::info!(phase_id = %phase.id, %project_id, "phase created");
    Ok((StatusCode::CREATED, Json(phase)))
}

/// GET /phases/{id}
async fn get_phase(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Phase>, ApiError> {
    let phase = PhaseRepo::new(&state.pool).get(id).await?;
    access::project(&state, &current.user, phase.project_id, ProjectAction::View).await?;
    Ok(Json(phase))
}

/// PATCH /phases/{id}
async fn update_phase(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePhaseRequest>,
) -> Result<Json<Phase>, ApiError> {
    let repo = PhaseRepo::new(&state.pool);
    let phase = repo.get(id).await?;
    access::project(&state, &current.user, phase.project_id, ProjectAction::ManagePhases).await?;

    let fields = fields(
        req.name.as_deref().unwrap_or(&phase.name),
        merge(req.description, phase.description).as_deref(),
        req.status.unwrap_or(phase.status),
        merge(req.start_date, phase.start_date),
        merge(req.end_date, phase.end_date),
    )?;
    Ok(Json(repo.update(id, fields).await?))
}

/// DELETE /phases/{id} - tasks of the phase stay, without a phase
async fn delete_phase(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = PhaseRepo::new(&state.pool);
    let phase = repo.get(id).await?;
    access::project(&state, &current.user, phase.project_id, ProjectAction::ManagePhases).await?;

    repo.delete(id).await?;

    tracing::info!(phase_id = %id, project_id = %phase.project_id, "phase deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Phase routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects/{id}/phases",
            get(list_phases).post(create_phase),
        )
        .route(
            "/phases/{id}",
            get(get_phase).patch(update_phase).delete(delete_phase),
        )
}
