/// Structured error types for the xtsqlorm library.
///
/// Uses `thiserror` so callers can match on the failure class.
/// Not-found is never an error here: lookups return `Option`, deletes `bool`.
use std::io;
use thiserror::Error;

use crate::value::Record;

/// Main error type for xtsqlorm operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failure reported by sqlx (constraint violation, connectivity, timeout)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bad or missing connection configuration, raised at construction time
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Payload rejected before any persistence attempt
    #[error("validation failed: {reason}")]
    Validation { reason: String, payload: Record },

    /// Table or column name outside `[A-Za-z0-9_]`
    #[error("invalid {kind} '{identifier}': only letters, digits and underscores are allowed")]
    InvalidIdentifier { kind: &'static str, identifier: String },

    /// Payload or query referenced a column the shape does not declare
    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Table shape is unusable (no primary key, duplicate column)
    #[error("schema error: {0}")]
    Schema(String),

    /// Reflection target does not exist
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A row written by `create` could not be read back
    #[error("inserted row in '{table}' could not be read back")]
    Materialize { table: String },

    /// A versioned update named a version the row no longer has
    #[error("row {id} in '{table}' has changed since it was read (stale version)")]
    VersionConflict { table: String, id: i64 },

    /// The execution scope was already closed
    #[error("session is closed")]
    SessionClosed,

    /// Unit of work used outside its active window
    #[error("unit of work is {actual}, expected {expected}")]
    UnitOfWorkState {
        actual: &'static str,
        expected: &'static str,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for xtsqlorm operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a validation error carrying the rejected payload
    pub fn validation(payload: Record, reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            payload,
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// True for input errors the caller can fix (as opposed to storage failures)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidIdentifier { .. } | Self::UnknownColumn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_error_display() {
        let err = Error::unknown_column("users", "nickname");
        assert_eq!(
            err.to_string(),
            "unknown column 'nickname' on table 'users'"
        );

        let err = Error::config("unknown database key 'nope'");
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn validation_keeps_payload() {
        let err = Error::validation(record! { "email" => "bad" }, "email: invalid format");
        assert!(err.is_validation());
        match err {
            Error::Validation { payload, reason } => {
                assert_eq!(payload.get("email").and_then(|v| v.as_str()), Some("bad"));
                assert_eq!(reason, "email: invalid format");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_validation());
    }
}
