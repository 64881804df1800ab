//! Task dependency repository
//!
//! The cycle check and the insert share one transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::tasks::{Task, TASK_COLUMNS};
use super::DbError;
use crate::services::graph;

/// Dependency edge from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskDependency {
    pub task_id: Uuid,
    pub depends_on_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Dependency repository
pub struct DependencyRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DependencyRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All `(task_id, depends_on_id)` edges between tasks of a project.
    pub async fn edges_for_project(&self, project_id: Uuid) -> Result<Vec<(Uuid, Uuid)>, DbError> {
        let edges = sqlx::query_as(
            r#"
            SELECT d.task_id, d.depends_on_id
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.task_id
            WHERE t.project_id = ?
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(edges)
    }

    /// Add `task_id -> depends_on_id`. Both tasks must already be known to
    /// belong to `project_id`. Adding an existing edge is a no-op.
    ///
    /// Fails with `Conflict` naming the cycle when the edge would close one.
    pub async fn add(
        &self,
        project_id: Uuid,
        task_id: Uuid,
        depends_on_id: Uuid,
    ) -> Result<TaskDependency, DbError> {
        let mut tx = self.pool.begin().await?;

        let edges = project_edges(&mut tx, project_id).await?;
        if let Some(cycle) = graph::would_create_cycle(&edges, task_id, depends_on_id) {
            let path: Vec<String> = cycle.iter().map(Uuid::to_string).collect();
            return Err(DbError::Conflict(format!(
                "dependency would create a cycle: {}",
                path.join(" -> ")
            )));
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(task_id)
        .bind(depends_on_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let dependency: TaskDependency = sqlx::query_as(
            r#"
            SELECT task_id, depends_on_id, created_at
            FROM task_dependencies
            WHERE task_id = ? AND depends_on_id = ?
            "#,
        )
        .bind(task_id)
        .bind(depends_on_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(%task_id, %depends_on_id, "dependency added");
        Ok(dependency)
    }

    pub async fn remove(&self, task_id: Uuid, depends_on_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_id = ?")
            .bind(task_id)
            .bind(depends_on_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("dependency", depends_on_id));
        }
        Ok(())
    }

    /// Tasks that `task_id` depends on.
    pub async fn prerequisites(&self, task_id: Uuid) -> Result<Vec<Task>, DbError> {
        let tasks = sqlx::query_as(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.depends_on_id
            WHERE d.task_id = ?
            ORDER BY t.title ASC
            "#
        ))
        .bind(task_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }

    /// Tasks that depend on `task_id`.
    pub async fn dependents(&self, task_id: Uuid) -> Result<Vec<Task>, DbError> {
        let tasks = sqlx::query_as(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM task_dependencies d
            JOIN tasks t ON t.id = d.task_id
            WHERE d.depends_on_id = ?
            ORDER BY t.title ASC
            "#
        ))
        .bind(task_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }
}

async fn project_edges(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
) -> Result<Vec<(Uuid, Uuid)>, DbError> {
    let edges = sqlx::query_as(
        r#"
        SELECT d.task_id, d.depends_on_id
        FROM task_dependencies d
        JOIN tasks t ON t.id = d.task_id
        WHERE t.project_id = ?
        "#,
    )
    .bind(project_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(edges)
}
