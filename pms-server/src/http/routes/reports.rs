//! Dashboard and portfolio reports

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::today;
use crate::auth::{Action, ProjectAction};
use crate::db::{MemberRepo, PhaseRepo, ReportRepo, TaskRepo};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::models::Role;
use crate::services::reports::{self, Portfolio, ProjectDashboard};

/// GET /projects/{id}/dashboard
async fn project_dashboard(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectDashboard>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let tasks = TaskRepo::new(&state.pool).all_for_project(project_id).await?;
    let phases = PhaseRepo::new(&state.pool).list(project_id).await?;
    let members = MemberRepo::new(&state.pool).list(project_id).await?;

    Ok(Json(reports::project_dashboard(
        project_id,
        &tasks,
        &phases,
        &members,
        today(),
    )))
}

/// GET /reports/portfolio
///
/// PMO users get every project; project managers only their own.
async fn portfolio(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<Json<Portfolio>, ApiError> {
    current.require(Action::ViewPortfolio)?;

    let today = today();
    let member_id = (current.user.role != Role::Pmo).then_some(current.user.id);
    let rows = ReportRepo::new(&state.pool).portfolio(today, member_id).await?;

    Ok(Json(reports::portfolio(rows, today)))
}

/// Report routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects/{id}/dashboard", get(project_dashboard))
        .route("/reports/portfolio", get(portfolio))
}
