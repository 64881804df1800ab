//! Route handlers organized by resource

pub mod attachments;
pub mod auth;
pub mod comments;
pub mod decisions;
pub mod health;
pub mod organizations;
pub mod phases;
pub mod projects;
pub mod reports;
pub mod spreadsheets;
pub mod tasks;
pub mod users;

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

/// `?q=` free-text filter
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Calendar day used for overdue and at-risk checks.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Binary download with a `Content-Disposition: attachment` file name.
pub(crate) fn download(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    let safe_name: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || !c.is_ascii() || c.is_ascii_control() { '_' } else { c })
        .collect();

    (
        [
            (CONTENT_TYPE, content_type.to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{safe_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
