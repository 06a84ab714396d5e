//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification every error falls into.
///
/// Callers branch on the kind rather than on concrete variants, so wrapping
/// an error with operation context never changes how it is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, e.g. a bad email
    InvalidArgument,
    /// A required aggregate is missing
    NotFound,
    /// Invalid state transition or uniqueness violation
    Conflict,
    /// Store, cache or queue I/O failure that may succeed on retry
    Transient,
    /// Bugs and broken invariants
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    // External service errors
    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{op}: {message}")]
    Queue { op: &'static str, message: String },

    #[error("{0} timed out")]
    Timeout(String),

    /// Rollback failed after the unit of work had already failed.
    /// The original error stays the source and decides the kind.
    #[error("rollback transaction: {rollback}, original error: {source}")]
    RollbackFailed {
        rollback: String,
        #[source]
        source: Box<AppError>,
    },

    // Internal
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Store { .. }
            | AppError::Cache(_)
            | AppError::Queue { .. }
            | AppError::Timeout(_) => ErrorKind::Transient,
            AppError::RollbackFailed { source, .. } => source.kind(),
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get error code for client
    fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Transient => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidArgument | ErrorKind::NotFound | ErrorKind::Conflict => {
                self.to_string()
            }
            ErrorKind::Transient => {
                tracing::error!(error = %self, "Backend error");
                "A backend service is unavailable".to_string()
            }
            ErrorKind::Internal => {
                tracing::error!(error = %self, "Internal error");
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, entity: &'static str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &'static str) -> AppResult<T> {
        self.ok_or(AppError::NotFound(entity))
    }
}

/// Convenience constructors
impl AppError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        AppError::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Wrap a database error with the operation that produced it.
    pub fn store(op: &'static str, source: sea_orm::DbErr) -> Self {
        AppError::Store { op, source }
    }

    pub fn queue(op: &'static str, message: impl ToString) -> Self {
        AppError::Queue {
            op,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failure_keeps_original_kind() {
        let err = AppError::RollbackFailed {
            rollback: "connection reset".to_string(),
            source: Box::new(AppError::conflict("matching is not pending")),
        };

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("connection reset"));
        assert!(err.to_string().contains("matching is not pending"));
    }

    #[test]
    fn test_transient_errors_map_to_service_unavailable() {
        let err = AppError::queue("receive messages", "broken pipe");
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "receive messages: broken pipe");
    }

    #[test]
    fn test_not_found_names_the_entity() {
        let err: AppResult<()> = None.ok_or_not_found("user");
        let err = err.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "user not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
