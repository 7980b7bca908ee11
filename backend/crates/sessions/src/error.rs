//! Session Error Types
//!
//! Session-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Store failures are never swallowed:
//! the session framework decides whether to fall back or fail the request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Session-specific result type alias
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Session id empty or too long
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Payload shape rejected before persistence
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Store call exceeded its deadline
    #[error("Session store timed out after {0:?}")]
    StoreTimeout(Duration),

    /// No such session owned by the caller
    #[error("Session not found")]
    SessionNotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidSessionId(_) => ErrorKind::BadRequest,
            SessionError::SchemaViolation(_) => ErrorKind::UnprocessableEntity,
            SessionError::StoreTimeout(_) => ErrorKind::ServiceUnavailable,
            SessionError::SessionNotFound => ErrorKind::NotFound,
            SessionError::Database(_) | SessionError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    fn log(&self) {
        match self {
            SessionError::Database(e) => {
                tracing::error!(error = %e, "Session database error");
            }
            SessionError::Internal(msg) => {
                tracing::error!(message = %msg, "Session internal error");
            }
            SessionError::StoreTimeout(after) => {
                tracing::error!(?after, "Session store timed out");
            }
            SessionError::SchemaViolation(reason) => {
                tracing::warn!(%reason, "Rejected session payload");
            }
            _ => {
                tracing::debug!(error = %self, "Session error");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            SessionError::Database(_) | SessionError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            // Pool exhaustion and connection loss map to 503
            SessionError::Database(e) => AppError::from(e),
            other => {
                let kind = other.kind();
                let message = other.public_message();
                AppError::new(kind, message)
            }
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SchemaViolation(err.to_string())
    }
}
