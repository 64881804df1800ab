//! Free-text fields: names, titles, comment bodies, descriptions

use super::ValidationError;

const MAX_NAME_LEN: usize = 128;
const MAX_TITLE_LEN: usize = 256;
const MAX_COMMENT_LEN: usize = 16 * 1024;
const MAX_DESCRIPTION_LEN: usize = 64 * 1024;

fn required(
    s: &str,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }

    Ok(trimmed.to_owned())
}

/// Display name of an organization, client, project, phase or user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(String);

impl Name {
    /// Non-empty after trimming, at most 128 characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        required(s, "name", MAX_NAME_LEN).map(Self)
    }

    /// Same rules, reported under a different field name.
    pub fn for_field(s: &str, field: &'static str) -> Result<Self, ValidationError> {
        required(s, field, MAX_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Task or decision title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(String);

impl Title {
    /// Create a new title.
    ///
    /// # Example
    /// ```
    /// use pms_server::models::Title;
    ///
    /// assert!(Title::new("Write API docs").is_ok());
    /// assert!(Title::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        required(s, "title", MAX_TITLE_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Comment body (16 KiB max).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        required(s, "body", MAX_COMMENT_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Optional long text. Blank input becomes `None`.
pub fn description(s: Option<&str>) -> Result<Option<String>, ValidationError> {
    optional_text(s, "description", MAX_DESCRIPTION_LEN)
}

/// Optional short text field (contact names, phone numbers, rationale).
pub fn optional_text(
    s: Option<&str>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.len() > max => Err(ValidationError::TooLong { field, max }),
        Some(text) => Ok(Some(text.to_owned())),
    }
}
