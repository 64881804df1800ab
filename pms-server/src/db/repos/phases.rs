//! Phase repository

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::DbError;
use crate::models::{Name, PhaseStatus};

/// Phase record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Phase {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: PhaseStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated phase fields, used for both create and full update
#[derive(Debug, Clone)]
pub struct PhaseFields {
    pub name: Name,
    pub description: Option<String>,
    pub status: PhaseStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

const RETURNING: &str = "RETURNING id, project_id, name, description, status, start_date, end_date, \
                         position, created_at, updated_at";

/// Phase repository
pub struct PhaseRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PhaseRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a phase after the project's last one.
    pub async fn create(&self, project_id: Uuid, fields: PhaseFields) -> Result<Phase, DbError> {
        let now = Utc::now();
        let phase: Phase = sqlx::query_as(&format!(
            r#"
            INSERT INTO phases
                (id, project_id, name, description, status, start_date, end_date, position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?,
                    (SELECT COALESCE(MAX(position) + 1, 0) FROM phases WHERE project_id = ?),
                    ?, ?)
            {RETURNING}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(fields.name.as_str())
        .bind(&fields.description)
        .bind(fields.status)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(project_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(phase_id = %phase.id, %project_id, position = phase.position, "phase created");
        Ok(phase)
    }

    pub async fn get(&self, id: Uuid) -> Result<Phase, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, project_id, name, description, status, start_date, end_date,
                   position, created_at, updated_at
            FROM phases
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("phase", id))
    }

    /// All phases of a project in display order.
    pub async fn list(&self, project_id: Uuid) -> Result<Vec<Phase>, DbError> {
        let phases = sqlx::query_as(
            r#"
            SELECT id, project_id, name, description, status, start_date, end_date,
                   position, created_at, updated_at
            FROM phases
            WHERE project_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(phases)
    }

    pub async fn update(&self, id: Uuid, fields: PhaseFields) -> Result<Phase, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE phases
            SET name = ?, description = ?, status = ?, start_date = ?, end_date = ?, updated_at = ?
            WHERE id = ?
            {RETURNING}
            "#
        ))
        .bind(fields.name.as_str())
        .bind(&fields.description)
        .bind(fields.status)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("phase", id))
    }

    /// Delete a phase. Its tasks stay in the project without a phase.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM phases WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("phase", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_project, seed_task, test_pool};
    use crate::db::TaskRepo;
    use crate::models::TaskStatus;

    fn fields(name: &str) -> PhaseFields {
        PhaseFields {
            name: Name::new(name).unwrap(),
            description: None,
            status: PhaseStatus::NotStarted,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn phases_append_in_order() {
        let pool = test_pool().await;
        let (project, _) = seed_project(&pool, "web").await;
        let repo = PhaseRepo::new(&pool);

        repo.create(project.id, fields("Discovery")).await.unwrap();
        repo.create(project.id, fields("Build")).await.unwrap();
        repo.create(project.id, fields("Launch")).await.unwrap();

        let names: Vec<_> = repo
            .list(project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.position, p.name))
            .collect();
        assert_eq!(
            names,
            vec![
                (0, "Discovery".to_string()),
                (1, "Build".to_string()),
                (2, "Launch".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn deleting_phase_detaches_tasks() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let phase = PhaseRepo::new(&pool).create(project.id, fields("Build")).await.unwrap();

        let task = seed_task(&pool, project.id, owner.id, "Wireframes", TaskStatus::Todo, None).await;
        sqlx::query("UPDATE tasks SET phase_id = ? WHERE id = ?")
            .bind(phase.id)
            .bind(task.id)
            .execute(&pool)
            .await
            .unwrap();

        PhaseRepo::new(&pool).delete(phase.id).await.unwrap();
        assert_eq!(TaskRepo::new(&pool).get(task.id).await.unwrap().phase_id, None);
    }
}
