//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., slug, email)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside the accepted range
    OutOfRange { field: &'static str, min: f64, max: f64 },

    /// End of a date range lies before its start
    InvalidDateRange { start: &'static str, end: &'static str },

    /// Value is well-formed but refers to something it may not reference
    InvalidReference { field: &'static str, reason: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            Self::InvalidDateRange { start, end } => {
                write!(f, "{} must not be before {}", end, start)
            }
            Self::InvalidReference { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "title exceeds maximum length of 256 characters"
        );
    }

    #[test]
    fn date_range_display() {
        let err = ValidationError::InvalidDateRange {
            start: "start_date",
            end: "due_date",
        };
        assert_eq!(err.to_string(), "due_date must not be before start_date");
    }
}
