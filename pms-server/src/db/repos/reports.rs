//! Reporting queries
//!
//! Per-project aggregates are computed in SQL so the portfolio report is a
//! single query regardless of the number of projects.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::DbError;
use crate::models::ProjectStatus;

/// One project line of the portfolio report
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PortfolioRow {
    pub project_id: Uuid,
    pub code: String,
    pub name: String,
    pub organization_name: String,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_tasks: i64,
    pub done_tasks: i64,
    pub cancelled_tasks: i64,
    pub overdue_tasks: i64,
    pub estimate_hours: f64,
    pub member_count: i64,
}

/// Report repository
pub struct ReportRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReportRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Aggregate every project (or only `member_id`'s projects).
    ///
    /// A task is overdue when it is open and its due date is before `today`.
    pub async fn portfolio(
        &self,
        today: NaiveDate,
        member_id: Option<Uuid>,
    ) -> Result<Vec<PortfolioRow>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT p.id AS project_id, p.code, p.name, o.name AS organization_name, p.status,
                   p.start_date, p.end_date,
                   (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id) AS total_tasks,
                   (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id AND t.status = 'done') AS done_tasks,
                   (SELECT COUNT(*) FROM tasks t WHERE t.project_id = p.id AND t.status = 'cancelled') AS cancelled_tasks,
                   (SELECT COUNT(*) FROM tasks t
                     WHERE t.project_id = p.id
                       AND t.status NOT IN ('done', 'cancelled')
                       AND t.due_date < "#,
        );
        qb.push_bind(today);
        qb.push(
            r#") AS overdue_tasks,
                   (SELECT TOTAL(t.estimate_hours) FROM tasks t
                     WHERE t.project_id = p.id AND t.status != 'cancelled') AS estimate_hours,
                   (SELECT COUNT(*) FROM project_members m WHERE m.project_id = p.id) AS member_count
            FROM projects p
            JOIN organizations o ON o.id = p.organization_id
            WHERE 1 = 1
            "#,
        );

        if let Some(member_id) = member_id {
            qb.push(" AND EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ")
                .push_bind(member_id)
                .push(")");
        }

        qb.push(" ORDER BY o.name ASC, p.name ASC");

        let rows = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_task, seed_project, test_pool};
    use crate::db::TaskRepo;
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn portfolio_counts_overdue_open_tasks() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let tasks = TaskRepo::new(&pool);
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();

        let late = crate::db::NewTask {
            due_date: Some(yesterday),
            estimate_hours: Some(4.0),
            ..new_task("late")
        };
        let late_but_done = crate::db::NewTask {
            due_date: Some(yesterday),
            status: TaskStatus::Done,
            estimate_hours: Some(2.5),
            ..new_task("shipped")
        };
        let dropped = crate::db::NewTask {
            status: TaskStatus::Cancelled,
            estimate_hours: Some(10.0),
            ..new_task("dropped")
        };
        for new in [late, late_but_done, dropped] {
            tasks.create(project.id, owner.id, new).await.unwrap();
        }

        let rows = ReportRepo::new(&pool).portfolio(today, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_tasks, 3);
        assert_eq!(row.done_tasks, 1);
        assert_eq!(row.cancelled_tasks, 1);
        assert_eq!(row.overdue_tasks, 1);
        assert_eq!(row.estimate_hours, 6.5);
        assert_eq!(row.member_count, 1);
    }
}
