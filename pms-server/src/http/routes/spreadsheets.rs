//! Task spreadsheet template, export and import

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::download;
use crate::auth::ProjectAction;
use crate::db::{MemberRepo, PhaseRepo, Task, TaskRepo};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::services::spreadsheet::{self, ImportContext};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub tasks: Vec<Task>,
}

/// GET /templates/tasks.xlsx
async fn task_template(_current: CurrentUser) -> Result<Response, ApiError> {
    let bytes = tokio::task::spawn_blocking(spreadsheet::template).await??;
    Ok(download(XLSX_CONTENT_TYPE, "task-import-template.xlsx", bytes))
}

/// GET /projects/{id}/tasks/export
async fn export_tasks(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let project = access::project(&state, &current.user, project_id, ProjectAction::View)
        .await?
        .project;

    let tasks = TaskRepo::new(&state.pool).all_for_project(project_id).await?;
    let phases = PhaseRepo::new(&state.pool).list(project_id).await?;
    let members = MemberRepo::new(&state.pool).list(project_id).await?;

    let count = tasks.len();
    let bytes =
        tokio::task::spawn_blocking(move || spreadsheet::export(&tasks, &phases, &members))
            .await??;

    tracing::info!(%project_id, tasks = count, "tasks exported");
    Ok(download(
        XLSX_CONTENT_TYPE,
        &format!("{}-tasks.xlsx", project.code),
        bytes,
    ))
}

/// POST /projects/{id}/tasks/import
///
/// Multipart field `file`. Any invalid row rejects the whole workbook with
/// 422 and the list of row errors.
async fn import_tasks(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::ManageTasks).await?;

    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            bytes = Some(field.bytes().await?);
        }
    }
    let bytes = bytes.ok_or_else(|| ApiError::BadRequest {
        message: "multipart field 'file' is required".into(),
    })?;

    let phases = PhaseRepo::new(&state.pool).list(project_id).await?;
    let members = MemberRepo::new(&state.pool).list(project_id).await?;
    let ctx = ImportContext::new(&phases, &members);

    let parsed = tokio::task::spawn_blocking(move || spreadsheet::import(&bytes, &ctx)).await??;
    let new_tasks = parsed.map_err(|rows| {
        tracing::info!(%project_id, invalid_rows = rows.len(), "task import rejected");
        ApiError::ImportFailed { rows }
    })?;

    let tasks = TaskRepo::new(&state.pool)
        .create_many(project_id, current.user.id, new_tasks)
        .await?;

    tracing::info!(%project_id, imported = tasks.len(), by = %current.user.id, "tasks imported");
    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            imported: tasks.len(),
            tasks,
        }),
    ))
}

/// Spreadsheet routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/templates/tasks.xlsx", get(task_template))
        .route("/projects/{id}/tasks/export", get(export_tasks))
        .route("/projects/{id}/tasks/import", post(import_tasks))
}
