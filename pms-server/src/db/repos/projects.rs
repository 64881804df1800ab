//! Project repository
//!
//! - create_with_owner: INSERT project + creator membership in one transaction
//! - list: optional status / organization / text filters, optionally limited
//!   to the projects a user is a member of
//! - delete: cascades to phases, tasks, members, decisions and attachment rows

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{search_pattern, DbError};
use crate::models::{Code, Name, Paginated, Pagination, ProjectStatus, Role};

/// Project record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub client_id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub organization_id: Uuid,
    pub client_id: Option<Uuid>,
    pub code: Code,
    pub name: Name,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Replacement values for the mutable columns of a project.
///
/// Callers merge a partial update onto the current row before building this.
#[derive(Debug, Clone)]
pub struct ProjectChanges {
    pub client_id: Option<Uuid>,
    pub code: Code,
    pub name: Name,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// List filters
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub organization_id: Option<Uuid>,
    pub q: Option<String>,
    /// Only projects this user is a member of
    pub member_id: Option<Uuid>,
}

const COLUMNS: &str = "p.id, p.organization_id, p.client_id, p.code, p.name, p.description, p.status, \
                       p.start_date, p.end_date, p.created_by, p.created_at, p.updated_at";

const RETURNING: &str = "RETURNING id, organization_id, client_id, code, name, description, status, \
                         start_date, end_date, created_by, created_at, updated_at";

const CODE_TAKEN: &str = "project code already exists in this organization";

/// Project repository
pub struct ProjectRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProjectRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a project and make `owner` its project manager.
    pub async fn create_with_owner(&self, new: NewProject, owner: Uuid) -> Result<Project, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let project: Project = sqlx::query_as(&format!(
            r#"
            INSERT INTO projects
                (id, organization_id, client_id, code, name, description, status,
                 start_date, end_date, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            {RETURNING}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.organization_id)
        .bind(new.client_id)
        .bind(new.code.as_str())
        .bind(new.name.as_str())
        .bind(&new.description)
        .bind(new.status)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(owner)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).conflict_as(CODE_TAKEN))?;

        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role, allocation_percent, joined_at)
            VALUES (?, ?, ?, 100, ?)
            "#,
        )
        .bind(project.id)
        .bind(owner)
        .bind(Role::Pm)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(project_id = %project.id, code = %project.code, "project created");
        Ok(project)
    }

    pub async fn get(&self, id: Uuid) -> Result<Project, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM projects p WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("project", id))
    }

    pub async fn list(&self, filter: &ProjectFilter, page: Pagination) -> Result<Paginated<Project>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, COUNT(*) OVER() AS total FROM projects p WHERE 1 = 1"
        ));

        if let Some(member_id) = filter.member_id {
            qb.push(" AND EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ")
                .push_bind(member_id)
                .push(")");
        }

        if let Some(status) = filter.status {
            qb.push(" AND p.status = ").push_bind(status);
        }

        if let Some(org) = filter.organization_id {
            qb.push(" AND p.organization_id = ").push_bind(org);
        }

        if let Some(pattern) = search_pattern(filter.q.as_deref()) {
            qb.push(" AND (p.name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.code LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, changes: ProjectChanges) -> Result<Project, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE projects
            SET client_id = ?, code = ?, name = ?, description = ?, status = ?,
                start_date = ?, end_date = ?, updated_at = ?
            WHERE id = ?
            {RETURNING}
            "#
        ))
        .bind(changes.client_id)
        .bind(changes.code.as_str())
        .bind(changes.name.as_str())
        .bind(&changes.description)
        .bind(changes.status)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as(CODE_TAKEN))?
        .ok_or_else(|| DbError::not_found("project", id))
    }

    /// Delete a project. Returns the ids of its attachments so their stored
    /// bytes can be removed.
    pub async fn delete(&self, id: Uuid) -> Result<Vec<Uuid>, DbError> {
        let mut tx = self.pool.begin().await?;

        let attachment_ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM attachments WHERE project_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("project", id));
        }

        tx.commit().await?;

        tracing::debug!(project_id = %id, attachments = attachment_ids.len(), "project deleted");
        Ok(attachment_ids.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_org, seed_user, test_pool};
    use crate::db::MemberRepo;

    fn new_project(org: Uuid, code: &str) -> NewProject {
        NewProject {
            organization_id: org,
            client_id: None,
            code: Code::new(code).unwrap(),
            name: Name::new("Website relaunch").unwrap(),
            description: None,
            status: ProjectStatus::Planning,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn creator_becomes_pm() {
        let pool = test_pool().await;
        let org = seed_org(&pool, "acme").await;
        let owner = seed_user(&pool, "pm@acme.test", Role::Pm).await;

        let project = ProjectRepo::new(&pool)
            .create_with_owner(new_project(org.id, "web"), owner.id)
            .await
            .unwrap();

        let role = MemberRepo::new(&pool).role_of(project.id, owner.id).await.unwrap();
        assert_eq!(role, Some(Role::Pm));
    }

    #[tokio::test]
    async fn code_unique_per_organization() {
        let pool = test_pool().await;
        let acme = seed_org(&pool, "acme").await;
        let globex = seed_org(&pool, "globex").await;
        let owner = seed_user(&pool, "pm@acme.test", Role::Pm).await;
        let repo = ProjectRepo::new(&pool);

        repo.create_with_owner(new_project(acme.id, "web"), owner.id).await.unwrap();
        repo.create_with_owner(new_project(globex.id, "web"), owner.id).await.unwrap();

        let err = repo
            .create_with_owner(new_project(acme.id, "web"), owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(m) if m == CODE_TAKEN));
    }

    #[tokio::test]
    async fn list_filters_by_membership() {
        let pool = test_pool().await;
        let org = seed_org(&pool, "acme").await;
        let alice = seed_user(&pool, "alice@acme.test", Role::Pm).await;
        let bob = seed_user(&pool, "bob@acme.test", Role::Pm).await;
        let repo = ProjectRepo::new(&pool);

        repo.create_with_owner(new_project(org.id, "a"), alice.id).await.unwrap();
        repo.create_with_owner(new_project(org.id, "b"), bob.id).await.unwrap();

        let all = repo.list(&ProjectFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let filter = ProjectFilter {
            member_id: Some(alice.id),
            ..Default::default()
        };
        let mine = repo.list(&filter, Pagination::default()).await.unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.items[0].code, "a");
    }

    #[tokio::test]
    async fn organization_with_projects_cannot_be_deleted() {
        let pool = test_pool().await;
        let org = seed_org(&pool, "acme").await;
        let owner = seed_user(&pool, "pm@acme.test", Role::Pm).await;
        let project = ProjectRepo::new(&pool)
            .create_with_owner(new_project(org.id, "web"), owner.id)
            .await
            .unwrap();

        let orgs = crate::db::OrganizationRepo::new(&pool);
        assert!(matches!(orgs.delete(org.id).await, Err(DbError::Conflict(_))));

        ProjectRepo::new(&pool).delete(project.id).await.unwrap();
        orgs.delete(org.id).await.unwrap();
    }
}
