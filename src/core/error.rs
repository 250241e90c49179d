//! Core error taxonomy
//!
//! Every fallible core operation resolves to one of these variants before
//! anything is written. Validation and not-found failures carry no partial
//! effect; constraint breaches are surfaced from SQLite verbatim; storage
//! failures are fatal to the calling operation and never retried internally.

use thiserror::Error;

/// Errors produced by the store, lifecycle controller and engines
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing required field or invalid enumeration value
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Reference to a nonexistent record
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Foreign-key, CHECK or uniqueness breach at the store
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::Constraint(
                    msg.clone().unwrap_or_else(|| "constraint failed".to_string()),
                )
            }
            _ => CoreError::Storage(err.to_string()),
        }
    }
}

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CoreError::validation("OEM is required");
        assert_eq!(err.to_string(), "Validation failed: OEM is required");

        let err = CoreError::not_found("Action", "ACT-0000000");
        assert_eq!(err.to_string(), "Action not found: ACT-0000000");
    }

    #[test]
    fn test_constraint_mapping() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("FOREIGN KEY constraint failed".to_string()),
        );
        let err = CoreError::from(sqlite_err);
        assert!(matches!(err, CoreError::Constraint(_)));
        assert!(err.to_string().contains("FOREIGN KEY"));
    }
}
