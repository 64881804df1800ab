//! Project and membership endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Action, ProjectAction};
use crate::db::{
    ClientRepo, DbError, MemberChanges, MemberRepo, MemberWithUser, NewProject, OrganizationRepo,
    Project, ProjectChanges, ProjectFilter, ProjectMember, ProjectRepo, UserRepo,
};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::patch::{merge, nullable};
use crate::http::server::AppState;
use crate::models::{
    check_range, description, Code, Name, Paginated, Pagination, PaginationParams, ProjectStatus,
    Role, ValidationError,
};

#[derive(Deserialize)]
pub struct ListProjectsQuery {
    pub status: Option<ProjectStatus>,
    pub organization_id: Option<Uuid>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub organization_id: Uuid,
    pub client_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub client_id: Option<Option<Uuid>>,
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Role,
    pub allocation_percent: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateMemberRequest {
    pub role: Option<Role>,
    pub allocation_percent: Option<i64>,
}

fn allocation(percent: i64) -> Result<i64, ValidationError> {
    if (0..=100).contains(&percent) {
        Ok(percent)
    } else {
        Err(ValidationError::OutOfRange {
            field: "allocation_percent",
            min: 0.0,
            max: 100.0,
        })
    }
}

/// A project's client must belong to the project's organization.
async fn check_client(
    state: &AppState,
    organization_id: Uuid,
    client_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(client_id) = client_id else {
        return Ok(());
    };

    let client = match ClientRepo::new(&state.pool).get(client_id).await {
        Ok(client) => Some(client),
        Err(DbError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    if !client.is_some_and(|c| c.organization_id == organization_id) {
        return Err(ValidationError::InvalidReference {
            field: "client_id",
            reason: "client does not belong to the project's organization",
        }
        .into());
    }
    Ok(())
}

/// GET /projects
///
/// PMO users see every project, everyone else only their memberships.
async fn list_projects(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<ListProjectsQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Project>>, ApiError> {
    let filter = ProjectFilter {
        status: query.status,
        organization_id: query.organization_id,
        q: query.q,
        member_id: (current.user.role != Role::Pmo).then_some(current.user.id),
    };
    let projects = ProjectRepo::new(&state.pool)
        .list(&filter, Pagination::from(params))
        .await?;
    Ok(Json(projects))
}

/// POST /projects - the creator joins as project manager
async fn create_project(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    current.require(Action::CreateProject)?;

    let new = NewProject {
        organization_id: req.organization_id,
        client_id: req.client_id,
        code: Code::new(&req.code)?,
        name: Name::new(&req.name)?,
        description: description(req.description.as_deref())?,
        status: req.status,
        start_date: req.start_date,
        end_date: req.end_date,
    };
    check_range(new.start_date, new.end_date, "start_date", "end_date")?;

    OrganizationRepo::new(&state.pool).get(new.organization_id).await?;
    check_client(&state, new.organization_id, new.client_id).await?;

    let project = ProjectRepo::new(&state.pool)
        .create_with_owner(new, current.user.id)
        .await?;

    tracing::info!(project_id = %project.id, code = %project.code, owner = %current.user.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects/{id}
async fn get_project(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    let access = access::project(&state, &current.user, id, ProjectAction::View).await?;
    Ok(Json(access.project))
}

/// PATCH /projects/{id}
async fn update_project(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let project = access::project(&state, &current.user, id, ProjectAction::ManageProject)
        .await?
        .project;

    let changes = ProjectChanges {
        client_id: merge(req.client_id, project.client_id),
        code: Code::new(req.code.as_deref().unwrap_or(&project.code))?,
        name: Name::new(req.name.as_deref().unwrap_or(&project.name))?,
        description: description(merge(req.description, project.description).as_deref())?,
        status: req.status.unwrap_or(project.status),
        start_date: merge(req.start_date, project.start_date),
        end_date: merge(req.end_date, project.end_date),
    };
    check_range(changes.start_date, changes.end_date, "start_date", "end_date")?;
    check_client(&state, project.organization_id, changes.client_id).await?;

    let updated = ProjectRepo::new(&state.pool).update(id, changes).await?;
    if updated.status != project.status {
        tracing::info!(project_id = %id, from = %project.status, to = %updated.status, "project status changed");
    }
    Ok(Json(updated))
}

/// DELETE /projects/{id}
async fn delete_project(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    access::project(&state, &current.user, id, ProjectAction::ManageProject).await?;

    let attachment_ids = ProjectRepo::new(&state.pool).delete(id).await?;
    for attachment_id in &attachment_ids {
        if let Err(e) = state.storage.remove(*attachment_id).await {
            tracing::warn!(%attachment_id, "failed to remove attachment file: {}", e);
        }
    }

    tracing::info!(project_id = %id, attachments = attachment_ids.len(), "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/members
async fn list_members(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberWithUser>>, ApiError> {
    access::project(&state, &current.user, id, ProjectAction::View).await?;
    Ok(Json(MemberRepo::new(&state.pool).list(id).await?))
}

/// POST /projects/{id}/members
async fn add_member(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<ProjectMember>), ApiError> {
    access::project(&state, &current.user, id, ProjectAction::ManageProject).await?;

    let percent = allocation(req.allocation_percent.unwrap_or(100))?;
    let user = UserRepo::new(&state.pool).get(req.user_id).await?;
    if !user.active {
        return Err(ValidationError::InvalidReference {
            field: "user_id",
            reason: "user is deactivated",
        }
        .into());
    }

    let member = MemberRepo::new(&state.pool)
        .add(id, user.id, req.role, percent)
        .await?;

    tracing::info!(project_id = %id, user_id = %user.id, role = %req.role, "member added");
    Ok((StatusCode::CREATED, Json(member)))
}

/// PATCH /projects/{id}/members/{user_id}
async fn update_member(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<ProjectMember>, ApiError> {
    access::project(&state, &current.user, id, ProjectAction::ManageProject).await?;

    let repo = MemberRepo::new(&state.pool);
    let member = repo.get(id, user_id).await?;

    let changes = MemberChanges {
        role: req.role.unwrap_or(member.role),
        allocation_percent: allocation(req.allocation_percent.unwrap_or(member.allocation_percent))?,
    };
    Ok(Json(repo.update(id, user_id, changes).await?))
}

/// DELETE /projects/{id}/members/{user_id}
///
/// The member's open tasks in this project lose their assignee.
async fn remove_member(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    access::project(&state, &current.user, id, ProjectAction::ManageProject).await?;

    let unassigned = MemberRepo::new(&state.pool).remove(id, user_id).await?;

    tracing::info!(project_id = %id, %user_id, unassigned, "member removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Project routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{id}/members", get(list_members).post(add_member))
        .route(
            "/projects/{id}/members/{user_id}",
            patch(update_member).delete(remove_member),
        )
}
