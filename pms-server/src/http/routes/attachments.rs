//! Attachment upload, listing and download

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::download;
use crate::auth::ProjectAction;
use crate::db::{Attachment, AttachmentRepo, DbError, NewAttachment, TaskRepo};
use crate::http::access;
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::models::{Paginated, Pagination, PaginationParams, ValidationError};
use crate::services::storage::sanitize_file_name;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Deserialize)]
pub struct ListAttachmentsQuery {
    pub task_id: Option<Uuid>,
}

struct Upload {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

fn parse_task_id(raw: &str) -> Result<Option<Uuid>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| ValidationError::InvalidFormat {
            field: "task_id",
            reason: "invalid UUID format",
        })
}

/// POST /projects/{id}/attachments
///
/// Multipart form: `file` (required) and `task_id` (optional).
async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::Attach).await?;

    let mut upload = None;
    let mut task_id = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let file_name = sanitize_file_name(field.file_name().unwrap_or_default());
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_owned();
                let bytes = field.bytes().await?;
                upload = Some(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "task_id" => task_id = parse_task_id(&field.text().await?)?,
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest {
        message: "multipart field 'file' is required".into(),
    })?;

    if let Some(task_id) = task_id {
        let task = match TaskRepo::new(&state.pool).get(task_id).await {
            Ok(task) => Some(task),
            Err(DbError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        if !task.is_some_and(|t| t.project_id == project_id) {
            return Err(ValidationError::InvalidReference {
                field: "task_id",
                reason: "task does not belong to this project",
            }
            .into());
        }
    }

    let id = Uuid::new_v4();
    let stored = state.storage.write(id, &upload.bytes).await?;

    let recorded = AttachmentRepo::new(&state.pool)
        .create(NewAttachment {
            id,
            project_id,
            task_id,
            uploaded_by: current.user.id,
            file_name: upload.file_name,
            content_type: upload.content_type,
            size_bytes: stored.size_bytes,
            sha256: stored.sha256,
        })
        .await;

    let attachment = match recorded {
        Ok(attachment) => attachment,
        Err(e) => {
            if let Err(remove_err) = state.storage.remove(id).await {
                tracing::warn!(attachment_id = %id, "failed to clean up stored file: {}", remove_err);
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        attachment_id = %attachment.id,
        %project_id,
        size = attachment.size_bytes,
        "attachment uploaded"
    );
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// GET /projects/{id}/attachments
async fn list_attachments(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListAttachmentsQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Attachment>>, ApiError> {
    access::project(&state, &current.user, project_id, ProjectAction::View).await?;

    let attachments = AttachmentRepo::new(&state.pool)
        .list_for_project(project_id, query.task_id, Pagination::from(params))
        .await?;
    Ok(Json(attachments))
}

/// Load an attachment and require `action` on its project.
async fn load(
    state: &AppState,
    current: &CurrentUser,
    id: Uuid,
    action: ProjectAction,
) -> Result<(Attachment, access::ProjectAccess), ApiError> {
    let attachment = AttachmentRepo::new(&state.pool).get(id).await?;
    let access = access::project(state, &current.user, attachment.project_id, action).await?;
    Ok((attachment, access))
}

/// GET /attachments/{id}
async fn get_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Attachment>, ApiError> {
    let (attachment, _) = load(&state, &current, id, ProjectAction::View).await?;
    Ok(Json(attachment))
}

/// GET /attachments/{id}/download
async fn download_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (attachment, _) = load(&state, &current, id, ProjectAction::View).await?;
    let bytes = state.storage.read(id).await?;
    Ok(download(&attachment.content_type, &attachment.file_name, bytes))
}

/// DELETE /attachments/{id} - uploader, project manager or PMO
async fn delete_attachment(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (attachment, access) = load(&state, &current, id, ProjectAction::View).await?;

    if attachment.uploaded_by != current.user.id && !access.allows(ProjectAction::ManageProject) {
        return Err(ApiError::forbidden(
            "only the uploader or a project manager may delete an attachment",
        ));
    }

    AttachmentRepo::new(&state.pool).delete(id).await?;
    state.storage.remove(id).await?;

    tracing::info!(attachment_id = %id, project_id = %attachment.project_id, "attachment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Attachment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects/{id}/attachments",
            get(list_attachments).post(upload_attachment),
        )
        .route(
            "/attachments/{id}",
            get(get_attachment).delete(delete_attachment),
        )
        .route("/attachments/{id}/download", get(download_attachment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_field() {
        assert_eq!(parse_task_id("  ").unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).unwrap(), Some(id));
        assert!(parse_task_id("nope").is_err());
    }
}
