//! Billing Error Types
//!
//! Billing-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.
//!
//! Anything that is not a 2xx tells the payment processor to redeliver the
//! webhook, so only failures worth retrying are mapped to 5xx.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Billing-specific result type alias
pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Signature header missing, unparsable, stale or not matching
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Authentic event whose body lacks a field the command needs
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Record rejected at the store boundary
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Compare-and-set lost more races than the retry budget allows
    #[error("Write conflict on payment {payment_id} after {attempts} attempts")]
    WriteConflict { payment_id: String, attempts: u32 },

    /// Store call exceeded its deadline
    #[error("Store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// Unknown checkout plan
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// No active subscription owned by the caller
    #[error("Active subscription not found")]
    SubscriptionNotFound,

    /// No processor API key configured
    #[error("Payment service unavailable")]
    ProcessorUnavailable,

    /// Processor API call failed
    #[error("Payment processor error: {0}")]
    Processor(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::InvalidSignature(_) => ErrorKind::BadRequest,
            BillingError::MalformedEvent(_) | BillingError::SchemaViolation(_) => {
                ErrorKind::UnprocessableEntity
            }
            BillingError::WriteConflict { .. } => ErrorKind::Conflict,
            BillingError::StoreTimeout(_) | BillingError::ProcessorUnavailable => {
                ErrorKind::ServiceUnavailable
            }
            BillingError::PlanNotFound(_) | BillingError::SubscriptionNotFound => {
                ErrorKind::NotFound
            }
            BillingError::Processor(_) => ErrorKind::BadGateway,
            BillingError::Database(_) | BillingError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            BillingError::Database(e) => {
                tracing::error!(error = %e, "Billing database error");
            }
            BillingError::Internal(msg) => {
                tracing::error!(message = %msg, "Billing internal error");
            }
            BillingError::WriteConflict {
                payment_id,
                attempts,
            } => {
                tracing::error!(%payment_id, attempts, "Payment write conflict budget exhausted");
            }
            BillingError::StoreTimeout(after) => {
                tracing::error!(?after, "Payment store timed out");
            }
            BillingError::InvalidSignature(reason) => {
                tracing::warn!(%reason, "Rejected webhook delivery");
            }
            BillingError::MalformedEvent(reason) | BillingError::SchemaViolation(reason) => {
                tracing::warn!(%reason, "Rejected webhook payload");
            }
            BillingError::Processor(msg) => {
                tracing::warn!(message = %msg, "Payment processor call failed");
            }
            _ => {
                tracing::debug!(error = %self, "Billing error");
            }
        }
    }

    /// Message safe to show to API clients
    fn public_message(&self) -> String {
        match self {
            BillingError::Database(_) | BillingError::Internal(_) => {
                "Internal server error".to_string()
            }
            BillingError::Processor(_) => "Payment processor request failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            // Pool exhaustion and connection loss map to 503
            BillingError::Database(e) => AppError::from(e),
            other => {
                let kind = other.kind();
                let message = other.public_message();
                AppError::new(kind, message)
            }
        }
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

impl From<platform::http_client::HttpClientError> for BillingError {
    fn from(err: platform::http_client::HttpClientError) -> Self {
        BillingError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Processor(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_conflict_is_409() {
        let err = BillingError::WriteConflict {
            payment_id: "p1".to_string(),
            attempts: 5,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(matches!(err.kind(), ErrorKind::Conflict));

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 409);
    }

    #[test]
    fn test_processor_details_hidden() {
        let app: AppError = BillingError::Processor("card_declined: sk_live_x".to_string()).into();
        assert_eq!(app.status_code(), 502);
        assert_eq!(app.message(), "Payment processor request failed");
    }
}
