//! Comment repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::DbError;
use crate::models::{CommentBody, Paginated, Pagination};

/// Comment record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment with its author's display name
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: String,
}

/// Comment repository
pub struct CommentRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommentRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task_id: Uuid, author_id: Uuid, body: &CommentBody) -> Result<Comment, DbError> {
        let now = Utc::now();
        let comment: Comment = sqlx::query_as(
            r#"
            INSERT INTO comments (id, task_id, author_id, body, edited, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            RETURNING id, task_id, author_id, body, edited, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(author_id)
        .bind(body.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(comment_id = %comment.id, %task_id, "comment created");
        Ok(comment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Comment, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, task_id, author_id, body, edited, created_at, updated_at
            FROM comments
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("comment", id))
    }

    /// Comments on a task, oldest first.
    pub async fn list_for_task(
        &self,
        task_id: Uuid,
        page: Pagination,
    ) -> Result<Paginated<CommentWithAuthor>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.task_id, c.author_id, c.body, c.edited, c.created_at, c.updated_at,
                   u.display_name AS author_name,
                   COUNT(*) OVER() AS total
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.task_id = ?
            ORDER BY c.created_at ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(task_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, body: &CommentBody) -> Result<Comment, DbError> {
        sqlx::query_as(
            r#"
            UPDATE comments
            SET body = ?, edited = 1, updated_at = ?
            WHERE id = ?
            RETURNING id, task_id, author_id, body, edited, created_at, updated_at
            "#,
        )
        .bind(body.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("comment", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("comment", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_project, seed_task, test_pool};
    use crate::models::TaskStatus;

    #[tokio::test]
    async fn edit_marks_comment_edited() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let task = seed_task(&pool, project.id, owner.id, "a", TaskStatus::Todo, None).await;
        let repo = CommentRepo::new(&pool);

        let comment = repo
            .create(task.id, owner.id, &CommentBody::new("first draft").unwrap())
            .await
            .unwrap();
        assert!(!comment.edited);

        let edited = repo
            .update(comment.id, &CommentBody::new("second draft").unwrap())
            .await
            .unwrap();
        assert!(edited.edited);
        assert_eq!(edited.body, "second draft");

        let page = repo.list_for_task(task.id, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].author_name, owner.display_name);
    }
}
