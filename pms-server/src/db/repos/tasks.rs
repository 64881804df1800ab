//! Task repository
//!
//! Tasks are kanban cards: every `(project_id, status)` column keeps dense
//! positions `0..n`. Writes that add, remove or move a card renumber the
//! affected columns inside the same transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{search_pattern, DbError};
use crate::models::{Paginated, Pagination, Priority, TaskStatus, Title};
use crate::services::kanban;

/// Task record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub phase_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub estimate_hours: Option<f64>,
    pub position: i64,
    pub created_by: Uuid,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields of a new task. References (phase, assignee) are checked
/// by the caller against the project.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub phase_id: Option<Uuid>,
    pub title: Title,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assignee_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub estimate_hours: Option<f64>,
}

/// Replacement values for a task's mutable columns, merged by the caller.
pub type TaskChanges = NewTask;

/// List filters
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub phase_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<Priority>,
    pub q: Option<String>,
}

pub(crate) const TASK_COLUMNS: &str = "t.id, t.project_id, t.phase_id, t.title, t.description, t.status, \
     t.priority, t.assignee_id, t.start_date, t.due_date, t.estimate_hours, t.position, \
     t.created_by, t.completed_at, t.created_at, t.updated_at";

const RETURNING: &str = "RETURNING id, project_id, phase_id, title, description, status, priority, \
     assignee_id, start_date, due_date, estimate_hours, position, created_by, completed_at, \
     created_at, updated_at";

/// Task repository
pub struct TaskRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TaskRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task at the end of its column.
    pub async fn create(&self, project_id: Uuid, created_by: Uuid, new: NewTask) -> Result<Task, DbError> {
        let mut tx = self.pool.begin().await?;
        let task = insert(&mut tx, project_id, created_by, &new).await?;
        tx.commit().await?;

        tracing::debug!(task_id = %task.id, %project_id, status = %task.status, "task created");
        Ok(task)
    }

    /// Create several tasks in one transaction (spreadsheet import).
    pub async fn create_many(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        tasks: Vec<NewTask>,
    ) -> Result<Vec<Task>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(tasks.len());
        for new in &tasks {
            created.push(insert(&mut tx, project_id, created_by, new).await?);
        }
        tx.commit().await?;

        tracing::debug!(%project_id, count = created.len(), "tasks imported");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Task, DbError> {
        sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("task", id))
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        filter: &TaskFilter,
        page: Pagination,
    ) -> Result<Paginated<Task>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS}, COUNT(*) OVER() AS total FROM tasks t WHERE t.project_id = "
        ));
        qb.push_bind(project_id);

        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(phase_id) = filter.phase_id {
            qb.push(" AND t.phase_id = ").push_bind(phase_id);
        }
        if let Some(assignee_id) = filter.assignee_id {
            qb.push(" AND t.assignee_id = ").push_bind(assignee_id);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND t.priority = ").push_bind(priority);
        }
        if let Some(pattern) = search_pattern(filter.q.as_deref()) {
            qb.push(" AND (t.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY t.created_at ASC, t.position ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    /// Tasks assigned to a user across projects, earliest due date first.
    pub async fn list_for_assignee(
        &self,
        user_id: Uuid,
        include_closed: bool,
        page: Pagination,
    ) -> Result<Paginated<Task>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS}, COUNT(*) OVER() AS total FROM tasks t WHERE t.assignee_id = "
        ));
        qb.push_bind(user_id);

        if !include_closed {
            qb.push(" AND t.status NOT IN ('done', 'cancelled')");
        }

        qb.push(" ORDER BY t.due_date IS NULL, t.due_date ASC, t.created_at ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    /// Every task of a project ordered by column and position.
    pub async fn all_for_project(&self, project_id: Uuid) -> Result<Vec<Task>, DbError> {
        let tasks = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ? ORDER BY t.status, t.position"
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }

    /// Replace a task's fields. A status change appends the task to the end
    /// of its new column and closes the gap in the old one.
    pub async fn update(&self, id: Uuid, changes: TaskChanges) -> Result<Task, DbError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch(&mut tx, id).await?;

        let position = if changes.status == current.status {
            current.position
        } else {
            column_len(&mut tx, current.project_id, changes.status).await?
        };
        let completed_at = completed_at(&current, changes.status);

        let task: Task = sqlx::query_as(&format!(
            r#"
            UPDATE tasks
            SET phase_id = ?, title = ?, description = ?, status = ?, priority = ?, assignee_id = ?,
                start_date = ?, due_date = ?, estimate_hours = ?, position = ?, completed_at = ?,
                updated_at = ?
            WHERE id = ?
            {RETURNING}
            "#
        ))
        .bind(changes.phase_id)
        .bind(changes.title.as_str())
        .bind(&changes.description)
        .bind(changes.status)
        .bind(changes.priority)
        .bind(changes.assignee_id)
        .bind(changes.start_date)
        .bind(changes.due_date)
        .bind(changes.estimate_hours)
        .bind(position)
        .bind(completed_at)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if changes.status != current.status {
            renumber(&mut tx, current.project_id, current.status).await?;
        }

        let task = if reopens(&current, changes.status) && unassign_non_member(&mut tx, id).await? {
            fetch(&mut tx, id).await?
        } else {
            task
        };

        tx.commit().await?;
        Ok(task)
    }

    /// Move a card to `status` at `index`. Returns the moved task.
    pub async fn move_task(&self, id: Uuid, status: TaskStatus, index: usize) -> Result<Task, DbError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch(&mut tx, id).await?;

        let mut columns = HashMap::new();
        for column in [current.status, status] {
            if !columns.contains_key(&column) {
                columns.insert(column, column_ids(&mut tx, current.project_id, column).await?);
            }
        }

        let placements = kanban::move_task(&columns, id, status, index)
            .map_err(|e| DbError::Conflict(e.to_string()))?;

        let now = Utc::now();
        for placement in &placements {
            sqlx::query("UPDATE tasks SET status = ?, position = ?, updated_at = ? WHERE id = ?")
                .bind(placement.status)
                .bind(placement.position)
                .bind(now)
                .bind(placement.task_id)
                .execute(&mut *tx)
                .await?;
        }

        if status != current.status {
            sqlx::query("UPDATE tasks SET completed_at = ? WHERE id = ?")
                .bind(completed_at(&current, status))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        if reopens(&current, status) {
            unassign_non_member(&mut tx, id).await?;
        }

        let task = fetch(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(
            task_id = %id,
            from = %current.status,
            to = %status,
            position = task.position,
            moved = placements.len(),
            "task moved"
        );
        Ok(task)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch(&mut tx, id).await?;

        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        renumber(&mut tx, current.project_id, current.status).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// `completed_at` after moving `task` to `status`: stamped when entering
/// done, kept while staying done, cleared otherwise.
fn completed_at(task: &Task, status: TaskStatus) -> Option<DateTime<Utc>> {
    match (task.status, status) {
        (TaskStatus::Done, TaskStatus::Done) => task.completed_at.or_else(|| Some(Utc::now())),
        (_, TaskStatus::Done) => Some(Utc::now()),
        _ => None,
    }
}

fn reopens(task: &Task, status: TaskStatus) -> bool {
    task.status.is_closed() && !status.is_closed()
}

/// Clear the assignee of a task whose assignee has left the project.
/// Member removal only unassigns open tasks, so this runs when a closed
/// task is reopened.
async fn unassign_non_member(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET assignee_id = NULL
        WHERE id = ?
          AND assignee_id IS NOT NULL
          AND NOT EXISTS (
              SELECT 1 FROM project_members m
              WHERE m.project_id = tasks.project_id AND m.user_id = tasks.assignee_id
          )
        "#,
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() > 0 {
        tracing::debug!(task_id = %id, "reopened task unassigned from former member");
    }
    Ok(result.rows_affected() > 0)
}

async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    created_by: Uuid,
    new: &NewTask,
) -> Result<Task, DbError> {
    let now = Utc::now();
    let position = column_len(tx, project_id, new.status).await?;
    let completed_at = (new.status == TaskStatus::Done).then_some(now);

    let task = sqlx::query_as(&format!(
        r#"
        INSERT INTO tasks
            (id, project_id, phase_id, title, description, status, priority, assignee_id,
             start_date, due_date, estimate_hours, position, created_by, completed_at,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        {RETURNING}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(new.phase_id)
    .bind(new.title.as_str())
    .bind(&new.description)
    .bind(new.status)
    .bind(new.priority)
    .bind(new.assignee_id)
    .bind(new.start_date)
    .bind(new.due_date)
    .bind(new.estimate_hours)
    .bind(position)
    .bind(created_by)
    .bind(completed_at)
    .bind(now)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(task)
}

async fn fetch(tx: &mut Transaction<'_, Sqlite>, id: Uuid) -> Result<Task, DbError> {
    sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found("task", id))
}

async fn column_len(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    status: TaskStatus,
) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE project_id = ? AND status = ?")
        .bind(project_id)
        .bind(status)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count)
}

async fn column_ids(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    status: TaskStatus,
) -> Result<Vec<Uuid>, DbError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM tasks WHERE project_id = ? AND status = ? ORDER BY position ASC, created_at ASC",
    )
    .bind(project_id)
    .bind(status)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Rewrite a column's positions as `0..n`, keeping the current order.
async fn renumber(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    status: TaskStatus,
) -> Result<(), DbError> {
    let ids = column_ids(tx, project_id, status).await?;
    for (position, id) in ids.into_iter().enumerate() {
        sqlx::query("UPDATE tasks SET position = ? WHERE id = ? AND position != ?")
            .bind(position as i64)
            .bind(id)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
