//! Attachment metadata repository. The bytes live in the attachment store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::DbError;
use crate::models::{Paginated, Pagination};

/// Attachment record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attachment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata of an uploaded file. The id is chosen before the bytes are
/// written so the stored file and the row share it.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
}

const COLUMNS: &str =
    "id, project_id, task_id, uploaded_by, file_name, content_type, size_bytes, sha256, created_at";

/// Attachment repository
pub struct AttachmentRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AttachmentRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewAttachment) -> Result<Attachment, DbError> {
        let attachment: Attachment = sqlx::query_as(&format!(
            r#"
            INSERT INTO attachments
                (id, project_id, task_id, uploaded_by, file_name, content_type, size_bytes, sha256, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(new.project_id)
        .bind(new.task_id)
        .bind(new.uploaded_by)
        .bind(&new.file_name)
        .bind(&new.content_type)
        .bind(new.size_bytes)
        .bind(&new.sha256)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(
            attachment_id = %attachment.id,
            project_id = %attachment.project_id,
            size = attachment.size_bytes,
            "attachment recorded"
        );
        Ok(attachment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Attachment, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM attachments WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("attachment", id))
    }

    /// Attachments of a project, newest first, optionally only those of one task.
    pub async fn list_for_project(
        &self,
        project_id: Uuid,
        task_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Paginated<Attachment>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, COUNT(*) OVER() AS total FROM attachments WHERE project_id = "
        ));
        qb.push_bind(project_id);

        if let Some(task_id) = task_id {
            qb.push(" AND task_id = ").push_bind(task_id);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("attachment", id));
        }
        Ok(())
    }
}
