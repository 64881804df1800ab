//! Project membership repository
//!
//! A project always keeps at least one PM: demoting or removing the last one
//! is refused with `Conflict`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::DbError;
use crate::models::Role;

/// Membership record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub allocation_percent: i64,
    pub joined_at: DateTime<Utc>,
}

/// Membership joined with the user it refers to
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MemberWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub member: ProjectMember,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct MemberChanges {
    pub role: Role,
    pub allocation_percent: i64,
}

const LAST_PM: &str = "a project must keep at least one project manager";

/// Membership repository
pub struct MemberRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MemberRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
        allocation_percent: i64,
    ) -> Result<ProjectMember, DbError> {
        let member: ProjectMember = sqlx::query_as(
            r#"
            INSERT INTO project_members (project_id, user_id, role, allocation_percent, joined_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING project_id, user_id, role, allocation_percent, joined_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .bind(allocation_percent)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as("user is already a member of this project"))?;

        tracing::debug!(%project_id, %user_id, %role, "member added");
        Ok(member)
    }

    pub async fn list(&self, project_id: Uuid) -> Result<Vec<MemberWithUser>, DbError> {
        let members = sqlx::query_as(
            r#"
            SELECT m.project_id, m.user_id, m.role, m.allocation_percent, m.joined_at,
                   u.email, u.display_name
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = ?
            ORDER BY u.display_name ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(members)
    }

    pub async fn get(&self, project_id: Uuid, user_id: Uuid) -> Result<ProjectMember, DbError> {
        sqlx::query_as(
            r#"
            SELECT project_id, user_id, role, allocation_percent, joined_at
            FROM project_members
            WHERE project_id = ? AND user_id = ?
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("member", user_id))
    }

    /// Membership role of `user_id`, or `None` for non-members.
    pub async fn role_of(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<Role>, DbError> {
        let role: Option<(Role,)> =
            sqlx::query_as("SELECT role FROM project_members WHERE project_id = ? AND user_id = ?")
                .bind(project_id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(role.map(|(role,)| role))
    }

    pub async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        Ok(self.role_of(project_id, user_id).await?.is_some())
    }

    pub async fn update(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        changes: MemberChanges,
    ) -> Result<ProjectMember, DbError> {
        let mut tx = self.pool.begin().await?;

        let current = current_role(&mut tx, project_id, user_id).await?;
        if current == Role::Pm && changes.role != Role::Pm && pm_count(&mut tx, project_id).await? <= 1 {
            return Err(DbError::Conflict(LAST_PM.into()));
        }

        let member: ProjectMember = sqlx::query_as(
            r#"
            UPDATE project_members
            SET role = ?, allocation_percent = ?
            WHERE project_id = ? AND user_id = ?
            RETURNING project_id, user_id, role, allocation_percent, joined_at
            "#,
        )
        .bind(changes.role)
        .bind(changes.allocation_percent)
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(member)
    }

    /// Remove a member and unassign their open tasks in the project.
    ///
    /// Returns the number of tasks that lost their assignee.
    pub async fn remove(&self, project_id: Uuid, user_id: Uuid) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;

        let current = current_role(&mut tx, project_id, user_id).await?;
        if current == Role::Pm && pm_count(&mut tx, project_id).await? <= 1 {
            return Err(DbError::Conflict(LAST_PM.into()));
        }

        let unassigned = sqlx::query(
            r#"
            UPDATE tasks
            SET assignee_id = NULL, updated_at = ?
            WHERE project_id = ? AND assignee_id = ? AND status NOT IN ('done', 'cancelled')
            "#,
        )
        .bind(Utc::now())
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(%project_id, %user_id, unassigned, "member removed");
        Ok(unassigned)
    }

    pub async fn count_with_role(&self, project_id: Uuid, role: Role) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM project_members WHERE project_id = ? AND role = ?")
                .bind(project_id)
                .bind(role)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

async fn current_role(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Role, DbError> {
    let row: Option<(Role,)> =
        sqlx::query_as("SELECT role FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
    row.map(|(role,)| role)
        .ok_or_else(|| DbError::not_found("member", user_id))
}

async fn pm_count(tx: &mut Transaction<'_, Sqlite>, project_id: Uuid) -> Result<i64, DbError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM project_members WHERE project_id = ? AND role = 'pm'")
            .bind(project_id)
            .fetch_one(&mut **tx)
            .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_project, seed_task, seed_user, test_pool};
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn last_pm_is_protected() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let repo = MemberRepo::new(&pool);

        let demote = MemberChanges {
            role: Role::Developer,
            allocation_percent: 100,
        };
        assert!(matches!(
            repo.update(project.id, owner.id, demote).await,
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            repo.remove(project.id, owner.id).await,
            Err(DbError::Conflict(_))
        ));

        let second = seed_user(&pool, "pm2@acme.test", Role::Pm).await;
        repo.add(project.id, second.id, Role::Pm, 50).await.unwrap();
        repo.remove(project.id, owner.id).await.unwrap();
        assert_eq!(repo.count_with_role(project.id, Role::Pm).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_membership_conflicts() {
        let pool = test_pool().await;
        let (project, _) = seed_project(&pool, "web").await;
        let dev = seed_user(&pool, "dev@acme.test", Role::Developer).await;
        let repo = MemberRepo::new(&pool);

        repo.add(project.id, dev.id, Role::Developer, 100).await.unwrap();
        assert!(matches!(
            repo.add(project.id, dev.id, Role::Designer, 100).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn removal_unassigns_open_tasks_only() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let dev = seed_user(&pool, "dev@acme.test", Role::Developer).await;
        let repo = MemberRepo::new(&pool);
        repo.add(project.id, dev.id, Role::Developer, 100).await.unwrap();

        let open = seed_task(&pool, project.id, owner.id, "Open", TaskStatus::InProgress, Some(dev.id)).await;
        let done = seed_task(&pool, project.id, owner.id, "Done", TaskStatus::Done, Some(dev.id)).await;

        assert_eq!(repo.remove(project.id, dev.id).await.unwrap(), 1);

        let tasks = crate::db::TaskRepo::new(&pool);
        assert_eq!(tasks.get(open.id).await.unwrap().assignee_id, None);
        assert_eq!(tasks.get(done.id).await.unwrap().assignee_id, Some(dev.id));
        assert!(!repo.is_member(project.id, dev.id).await.unwrap());
    }
}
