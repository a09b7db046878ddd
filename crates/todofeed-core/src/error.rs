//! Error types and result handling for to-do operations.
//!
//! Defines the storage error mapping and the coded error taxonomy surfaced by
//! the HTTP layer. Codes let clients tell parse failures apart from
//! persistence failures without parsing messages.

use thiserror::Error;

use crate::models::ToDoId;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage and model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Coded errors reported to callers of the ingress endpoint.
#[derive(Debug, Error)]
pub enum TodoError {
    /// Request body is not a valid to-do record (E1001).
    #[error("[E1001] Invalid payload: {reason}")]
    InvalidPayload {
        /// Why the body was rejected
        reason: String,
    },

    /// The durable sink rejected or failed the write (E2001).
    #[error("[E2001] Durable write failed for item {id}: {source}")]
    SinkWriteFailed {
        /// Item that could not be written
        id: ToDoId,
        /// Underlying storage failure
        #[source]
        source: CoreError,
    },
}

impl TodoError {
    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload { .. } => "E1001",
            Self::SinkWriteFailed { .. } => "E2001",
        }
    }
}
