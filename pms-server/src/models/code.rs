//! Short codes for organizations and projects
//!
//! Slug format: lowercase alphanumeric with hyphens/underscores

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Maximum length for codes
const MAX_CODE_LEN: usize = 32;

/// Matches: ^[a-z0-9][a-z0-9_-]{0,31}$
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,31}$").expect("invalid code regex"));

/// Validated organization or project code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(String);

impl Code {
    /// Create a new code, validating slug format.
    ///
    /// Input is trimmed and lowercased first, so `" ACME "` becomes `acme`.
    ///
    /// # Example
    /// ```
    /// use pms_server::models::Code;
    ///
    /// assert!(Code::new("erp-2024").is_ok());
    /// assert_eq!(Code::new("ACME").unwrap().as_str(), "acme");
    /// assert!(Code::new("-dash-start").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "code" });
        }

        if normalized.len() > MAX_CODE_LEN {
            return Err(ValidationError::TooLong {
                field: "code",
                max: MAX_CODE_LEN,
            });
        }

        if !CODE_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                reason: "must be alphanumeric with hyphens/underscores, starting with alphanumeric",
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
