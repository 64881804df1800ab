//! Repository error type

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Replace the generic conflict message with a caller-specific one.
    pub fn conflict_as(self, message: &str) -> Self {
        match self {
            Self::Conflict(_) => Self::Conflict(message.to_owned()),
            other => other,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Self::Conflict("resource already exists".into());
            }
            // SQLite reports ON DELETE RESTRICT as SQLITE_CONSTRAINT_TRIGGER (1811).
            if db.is_foreign_key_violation() || db.code().as_deref() == Some("1811") {
                return Self::Conflict("resource is referenced by other records".into());
            }
        }
        Self::Sqlx(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_as_only_rewrites_conflicts() {
        let err = DbError::Conflict("x".into()).conflict_as("code taken");
        assert!(matches!(err, DbError::Conflict(m) if m == "code taken"));

        let err = DbError::not_found("task", "42").conflict_as("code taken");
        assert!(matches!(err, DbError::NotFound { resource: "task", .. }));
    }

    #[test]
    fn row_not_found_stays_sqlx() {
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::Sqlx(_)));
    }
}
