//! Project-scoped authorization
//!
//! Handlers resolve the resource, find its project, then check the caller's
//! membership role against the required `ProjectAction`.

use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::auth::{can_on_project, ProjectAction};
use crate::db::{DbError, MemberRepo, PhaseRepo, Project, ProjectRepo, Task, TaskRepo, User};
use crate::models::{Role, ValidationError};

/// A project the caller may act on, with the caller's membership role.
pub struct ProjectAccess {
    pub project: Project,
    pub membership: Option<Role>,
    global: Role,
}

impl ProjectAccess {
    pub fn allows(&self, action: ProjectAction) -> bool {
        can_on_project(self.global, self.membership, action)
    }

    pub fn require(&self, action: ProjectAction) -> Result<(), ApiError> {
        if self.allows(action) {
            return Ok(());
        }
        Err(match self.membership {
            None => ApiError::forbidden("not a member of this project"),
            Some(role) => ApiError::forbidden(format!(
                "project role '{}' may not perform this action",
                role
            )),
        })
    }
}

/// Load a project and require `action` on it (404, then 403).
pub async fn project(
    state: &AppState,
    user: &User,
    project_id: Uuid,
    action: ProjectAction,
) -> Result<ProjectAccess, ApiError> {
    let project = ProjectRepo::new(&state.pool).get(project_id).await?;
    let membership = MemberRepo::new(&state.pool)
        .role_of(project_id, user.id)
        .await?;

    let access = ProjectAccess {
        project,
        membership,
        global: user.role,
    };
    access.require(action)?;
    Ok(access)
}

/// Load a task and require `action` on its project.
pub async fn task(
    state: &AppState,
    user: &User,
    task_id: Uuid,
    action: ProjectAction,
) -> Result<(Task, ProjectAccess), ApiError> {
    let task = TaskRepo::new(&state.pool).get(task_id).await?;
    let access = project(state, user, task.project_id, action).await?;
    Ok((task, access))
}

/// Phase and assignee of a task must belong to the task's project.
pub async fn check_task_refs(
    state: &AppState,
    project_id: Uuid,
    phase_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if let Some(phase_id) = phase_id {
        let phase = match PhaseRepo::new(&state.pool).get(phase_id).await {
            Ok(phase) => Some(phase),
            Err(DbError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        if !phase.is_some_and(|phase| phase.project_id == project_id) {
            return Err(ValidationError::InvalidReference {
                field: "phase_id",
                reason: "phase does not belong to this project",
            }
            .into());
        }
    }

    if let Some(assignee_id) = assignee_id {
        if !MemberRepo::new(&state.pool)
            .is_member(project_id, assignee_id)
            .await?
        {
            return Err(ValidationError::InvalidReference {
                field: "assignee_id",
                reason: "assignee is not a member of this project",
            }
            .into());
        }
    }

    Ok(())
}
