//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::PasswordError;
use crate::db::DbError;
use crate::models::ValidationError;
use crate::services::spreadsheet::{RowError, SpreadsheetError};
use crate::services::storage::StorageError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Malformed request that is not a field validation failure (400)
    BadRequest { message: String },

    /// Missing, invalid or expired session (401)
    Unauthorized,

    /// Login with an unknown email, wrong password or inactive account (401)
    InvalidCredentials,

    /// Authenticated but not allowed (403)
    Forbidden { reason: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Uniqueness, state-machine or graph conflict (409)
    Conflict { message: String },

    /// Upload over the configured limit (413)
    PayloadTooLarge { message: String },

    /// Spreadsheet rows failed validation; nothing was imported (422)
    ImportFailed { rows: Vec<RowError> },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": e.to_string()
                }),
            ),
            Self::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": message
                }),
            ),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "unauthorized",
                    "message": "authentication required"
                }),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "unauthorized",
                    "message": "invalid email or password"
                }),
            ),
            Self::Forbidden { reason } => (
                StatusCode::FORBIDDEN,
                json!({
                    "error": "forbidden",
                    "message": reason
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Conflict { message } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "conflict",
                    "message": message
                }),
            ),
            Self::PayloadTooLarge { message } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({
                    "error": "payload_too_large",
                    "message": message
                }),
            ),
            Self::ImportFailed { rows } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "import_failed",
                    "message": format!("{} row error(s); nothing was imported", rows.len()),
                    "rows": rows
                }),
            ),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::Conflict(message) => Self::Conflict { message },
            _ => Self::Database(e),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::TooLarge { .. } => Self::PayloadTooLarge {
                message: e.to_string(),
            },
            StorageError::Missing(id) => Self::NotFound {
                resource: "attachment file",
                id: id.to_string(),
            },
            StorageError::Io(_) => Self::internal(e),
        }
    }
}

impl From<SpreadsheetError> for ApiError {
    fn from(e: SpreadsheetError) -> Self {
        match e {
            SpreadsheetError::Write(_) => Self::internal(e),
            _ => Self::BadRequest {
                message: e.to_string(),
            },
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        Self::internal(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge {
                message: e.body_text(),
            }
        } else {
            Self::BadRequest {
                message: e.body_text(),
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::Validation(ValidationError::Empty { field: "name" });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "name cannot be empty");
    }

    #[tokio::test]
    async fn db_errors_map_by_kind() {
        let response = ApiError::from(DbError::not_found("task", "42")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::from(DbError::Conflict("code taken".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["message"], "code taken");

        let response = ApiError::from(DbError::from(sqlx::Error::RowNotFound)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["message"],
            "an internal error occurred"
        );
    }

    #[tokio::test]
    async fn unauthorized_is_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forbidden_is_403() {
        let response = ApiError::forbidden("not a project member").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let err = StorageError::TooLarge { size: 10, max: 5 };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn import_failure_lists_rows() {
        let err = ApiError::ImportFailed {
            rows: vec![RowError {
                row: 3,
                message: "title cannot be empty".into(),
            }],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"], "import_failed");
        assert_eq!(body["rows"][0]["row"], 3);
    }
}
