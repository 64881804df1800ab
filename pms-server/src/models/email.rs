//! User email addresses

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex")
});

/// Lowercased, syntactically plausible email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if normalized.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like name@example.com",
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases() {
        assert_eq!(
            Email::new(" Ada@Example.COM ").unwrap().as_str(),
            "ada@example.com"
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "ada", "ada@", "@example.com", "ada@example", "a da@x.io"] {
            assert!(Email::new(bad).is_err(), "{bad} should be rejected");
        }
    }
}
