//! Task, kanban board, dependency and timeline endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::today;
use crate::auth::ProjectAction;
use crate::db::{
    DbError, DependencyRepo, NewTask, PhaseRepo, Task, TaskDependency, TaskFilter, TaskRepo,
};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::patch::{merge, nullable};
use crate::http::server::AppState;
use crate::models::{
    check_range, description, Paginated, Pagination, PaginationParams, Priority, TaskStatus,
    Title, ValidationError,
};
use crate::services::kanban::{self, BoardColumn};
use crate::services::timeline::{self, Timeline};

#[derive(Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub phase_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct MyTasksQuery {
    #[serde(default)]
    pub include_closed: bool,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub phase_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub estimate_hours: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub phase_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub estimate_hours: Option<Option<f64>>,
}

#[derive(Deserialize)]
pub struct MoveTaskRequest {
    pub status: TaskStatus,
    /// Zero-based index in the target column; clamped to its length
    pub position: usize,
}

#[derive(Deserialize)]
pub struct AddDependencyRequest {
    pub depends_on_id: Uuid,
}

#[derive(Serialize)]
pub struct TaskDependencies {
    /// Tasks this task waits for
    pub depends_on: Vec<Task>,
    /// Tasks waiting for this task
    pub dependents: Vec<Task>,
}

fn estimate(hours: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(ValidationError::InvalidFormat {
            field: "estimate_hours",
            reason: "must be a non-negative number",
        }),
        other => Ok(other),
    }
}

/// Validate the self-contained task fields (title, text, dates, estimate).
#[allow(clippy::too_many_arguments)]
fn task_fields(
    phase_id: Option<Uuid>,
    title: &str,
    desc: Option<&str>,
    status: TaskStatus,
    priority: Priority,
    assignee_id: Option<Uuid>,
    start_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    estimate_hours: Option<f64>,
) -> Result<NewTask, ValidationError> {
    check_range(start_date, due_date, "start_date", "due_date")?;
    Ok(NewTask {
        phase_id,
        title: Title::new(title)?,
        description: description(desc)?,
        status,
        priority,
        assignee_id,
        start_date,
        due_date,
        estimate_hours: estimate(estimate_hours)?,
    })
}

/// GET /projects/{id}/tasks
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListTasksQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Task>>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let filter = TaskFilter {
        status: query.status,
        phase_id: query.phase_id,
        assignee_id: query.assignee_id,
        priority: query.priority,
        q: query.q,
    };
    let tasks = TaskRepo::new(&state.pool)
        .list(project_id, &filter, Pagination::from(params))
        .await?;
    Ok(Json(tasks))
}

/// POST /projects/{id}/tasks - appended to the end of its column
async fn create_task(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::EditTask).await?;

    let new = task_fields(
        req.phase_id,
        &req.title,
        req.description.as_deref(),
        req.status,
        req.priority,
        req.assignee_id,
        req.start_date,
        req.due_date,
        req.estimate_hours,
    )?;
    access::check_task_refs(&state, project_id, new.phase_id, new.assignee_id).await?;

    let task = TaskRepo::new(&state.pool)
        .create(project_id, current.user.id, new)
        .await?;

    tracing::info!(task_id = %task.id, %project_id, status = %task.status, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /me/tasks - open tasks assigned to the caller across projects
async fn my_tasks(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Query(query): Query<MyTasksQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Task>>, ApiError> {
    let tasks = TaskRepo::new(&state.pool)
        .list_for_assignee(current.user.id, query.include_closed, Pagination::from(params))
        .await?;
    Ok(Json(tasks))
}

/// GET /tasks/{id}
async fn get_task(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let (task, _) = access::task(&state, &current.user, id, ProjectAction::View).await?;
    Ok(Json(task))
}

/// PATCH /tasks/{id}
///
/// A status change moves the task to the end of the new column.
async fn update_task(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let (task, _) = access::task(&state, &current.user, id, ProjectAction::EditTask).await?;

    let changes = task_fields(
        merge(req.phase_id, task.phase_id),
        req.title.as_deref().unwrap_or(&task.title),
        merge(req.description, task.description.clone()).as_deref(),
        req.status.unwrap_or(task.status),
        req.priority.unwrap_or(task.priority),
        merge(req.assignee_id, task.assignee_id),
        merge(req.start_date, task.start_date),
        merge(req.due_date, task.due_date),
        merge(req.estimate_hours, task.estimate_hours),
    )?;
    // Only references the request changes are checked; a closed task may
    // still name an assignee who has since left the project.
    access::check_task_refs(
        &state,
        task.project_id,
        changes.phase_id.filter(|phase| Some(*phase) != task.phase_id),
        changes.assignee_id.filter(|assignee| Some(*assignee) != task.assignee_id),
    )
    .await?;

    let updated = TaskRepo::new(&state.pool).update(id, changes).await?;
    if updated.status != task.status {
        tracing::info!(task_id = %id, from = %task.status, to = %updated.status, "task status changed");
    }
    Ok(Json(updated))
}

/// DELETE /tasks/{id}
async fn delete_task(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (task, _) = access::task(&state, &current.user, id, ProjectAction::ManageTasks).await?;
    TaskRepo::new(&state.pool).delete(id).await?;

    tracing::info!(task_id = %id, project_id = %task.project_id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/board
async fn board(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<BoardColumn>>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let tasks = TaskRepo::new(&state.pool).all_for_project(project_id).await?;
    Ok(Json(kanban::columns(tasks)))
}

/// POST /tasks/{id}/move
async fn move_task(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    access::task(&state, &current.user, id, ProjectAction::EditTask).await?;

    let task = TaskRepo::new(&state.pool)
        .move_task(id, req.status, req.position)
        .await?;
    Ok(Json(task))
}

/// GET /tasks/{id}/dependencies
async fn list_dependencies(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDependencies>, ApiError> {
    access::task(&state, &current.user, id, ProjectAction::View).await?;

    let repo = DependencyRepo::new(&state.pool);
    Ok(Json(TaskDependencies {
        depends_on: repo.prerequisites(id).await?,
        dependents: repo.dependents(id).await?,
    }))
}

/// POST /tasks/{id}/dependencies
///
/// 409 when the new edge would close a cycle; the message lists the path.
async fn add_dependency(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddDependencyRequest>,
) -> Result<(StatusCode, Json<TaskDependency>), ApiError> {
    let (task, _) = access::task(&state, &current.user, id, ProjectAction::ManageTasks).await?;

    let prerequisite = match TaskRepo::new(&state.pool).get(req.depends_on_id).await {
        Ok(prerequisite) => Some(prerequisite),
        Err(DbError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    if !prerequisite.is_some_and(|p| p.project_id == task.project_id) {
        return Err(ValidationError::InvalidReference {
            field: "depends_on_id",
            reason: "task does not belong to this project",
        }
        .into());
    }

    let dependency = DependencyRepo::new(&state.pool)
        .add(task.project_id, id, req.depends_on_id)
        .await?;

    tracing::info!(task_id = %id, depends_on_id = %req.depends_on_id, "dependency added");
    Ok((StatusCode::CREATED, Json(dependency)))
}

/// DELETE /tasks/{id}/dependencies/{depends_on_id}
async fn remove_dependency(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path((id, depends_on_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    access::task(&state, &current.user, id, ProjectAction::ManageTasks).await?;
    DependencyRepo::new(&state.pool)
        .remove(id, depends_on_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/timeline
async fn project_timeline(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Timeline>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let phases = PhaseRepo::new(&state.pool).list(project_id).await?;
    let tasks = TaskRepo::new(&state.pool).all_for_project(project_id).await?;
    let edges = DependencyRepo::new(&state.pool)
        .edges_for_project(project_id)
        .await?;

    Ok(Json(timeline::build(
        project_id,
        &phases,
        &tasks,
        &edges,
        today(),
    )))
}

/// Task routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects/{id}/tasks",
            get(list_tasks).post(create_task),
        )
        .route("/projects/{id}/board", get(board))
        .route("/projects/{id}/timeline", get(project_timeline))
        .route("/me/tasks", get(my_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/move", post(move_task))
        .route(
            "/tasks/{id}/dependencies",
            get(list_dependencies).post(add_dependency),
        )
        .route(
            "/tasks/{id}/dependencies/{depends_on_id}",
            delete(remove_dependency),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, 4, d)
    }

    #[test]
    fn task_fields_validate() {
        let ok = task_fields(
            None,
            "  Ship it ",
            Some(""),
            TaskStatus::Todo,
            Priority::High,
            None,
            day(1),
            day(1),
            Some(0.0),
        )
        .unwrap();
        assert_eq!(ok.title.as_str(), "Ship it");
        assert_eq!(ok.description, None);

        let inverted = task_fields(
            None,
            "x",
            None,
            TaskStatus::Todo,
            Priority::Low,
            None,
            day(5),
            day(4),
            None,
        );
        assert!(matches!(inverted, Err(ValidationError::InvalidDateRange { .. })));
    }

    #[test]
    fn negative_estimate_is_rejected() {
        assert!(estimate(Some(-0.5)).is_err());
        assert!(estimate(Some(f64::NAN)).is_err());
        assert_eq!(estimate(Some(1.5)).unwrap(), Some(1.5));
        assert_eq!(estimate(None).unwrap(), None);
    }
}
