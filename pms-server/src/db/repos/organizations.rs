//! Organization repository
//!
//! - create: INSERT, unique code enforced by constraint
//! - delete: refused by the `ON DELETE RESTRICT` on projects

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{search_pattern, DbError};
use crate::models::{Code, Name, Paginated, Pagination};

/// Organization record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization with aggregate counts for list display
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrganizationWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub organization: Organization,
    pub client_count: i64,
    pub project_count: i64,
}

/// Validated organization fields
#[derive(Debug, Clone)]
pub struct OrganizationFields {
    pub name: Name,
    pub code: Code,
    pub description: Option<String>,
}

const COLUMNS: &str = "o.id, o.name, o.code, o.description, o.created_at, o.updated_at";

/// Organization repository
pub struct OrganizationRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrganizationRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, fields: OrganizationFields) -> Result<Organization, DbError> {
        let now = Utc::now();
        let org: Organization = sqlx::query_as(
            r#"
            INSERT INTO organizations (id, name, code, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, code, description, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(fields.name.as_str())
        .bind(fields.code.as_str())
        .bind(&fields.description)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as("organization code already exists"))?;

        tracing::debug!(org_id = %org.id, code = %org.code, "organization created");
        Ok(org)
    }

    pub async fn get(&self, id: Uuid) -> Result<Organization, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM organizations o WHERE o.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("organization", id))
    }

    /// List organizations with client and project counts.
    ///
    /// Counts come from correlated subqueries in the same statement (no N+1).
    pub async fn list(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<OrganizationWithCounts>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT {COLUMNS},
                (SELECT COUNT(*) FROM clients c WHERE c.organization_id = o.id) AS client_count,
                (SELECT COUNT(*) FROM projects p WHERE p.organization_id = o.id) AS project_count,
                COUNT(*) OVER() AS total
            FROM organizations o
            WHERE 1 = 1
            "#
        ));

        if let Some(pattern) = search_pattern(q) {
            qb.push(" AND (o.name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR o.code LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY o.name ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, fields: OrganizationFields) -> Result<Organization, DbError> {
        sqlx::query_as(
            r#"
            UPDATE organizations
            SET name = ?, code = ?, description = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, name, code, description, created_at, updated_at
            "#,
        )
        .bind(fields.name.as_str())
        .bind(fields.code.as_str())
        .bind(&fields.description)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as("organization code already exists"))?
        .ok_or_else(|| DbError::not_found("organization", id))
    }

    /// Delete an organization and its clients. Fails with `Conflict` while
    /// any project still belongs to it.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let projects: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE organization_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if projects > 0 {
            return Err(DbError::Conflict("organization still has projects".into()));
        }

        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from(e).conflict_as("organization still has projects"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("organization", id));
        }
        tx.commit().await?;
        Ok(())
    }
}
