//! Payout Error Types
//!
//! Domain errors only. Mapping to transport status codes belongs to the API layer.

use thiserror::Error;

use super::state::PayoutStatus;
use super::types::PayoutId;

/// Payout error types
#[derive(Error, Debug, Clone)]
pub enum PayoutError {
    // === Request Errors ===
    #[error("Invalid payout: {0}")]
    Validation(String),

    #[error("Cannot {action} payout in {current} status.")]
    StateConflict {
        action: &'static str,
        current: PayoutStatus,
    },

    #[error("Payout {0} not found.")]
    NotFound(PayoutId),

    // === Processing Errors ===
    #[error("{0}")]
    Processing(String),

    // === System Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Internal system error: {0}")]
    System(String),
}

impl PayoutError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PayoutError::Validation(_) => "VALIDATION_ERROR",
            PayoutError::StateConflict { .. } => "STATE_CONFLICT",
            PayoutError::NotFound(_) => "PAYOUT_NOT_FOUND",
            PayoutError::Processing(_) => "PROCESSING_ERROR",
            PayoutError::Database(_) => "DATABASE_ERROR",
            PayoutError::Dispatch(_) => "DISPATCH_ERROR",
            PayoutError::System(_) => "SYSTEM_ERROR",
        }
    }

    /// Whether a worker may re-run the job that produced this error.
    ///
    /// Processing errors are retryable only in the sense that the retry
    /// observes the already-recorded FAILED status and no-ops.
    pub fn is_retryable(&self) -> bool {
        match self {
            PayoutError::Validation(_)
            | PayoutError::StateConflict { .. }
            | PayoutError::NotFound(_) => false,
            PayoutError::Processing(_)
            | PayoutError::Database(_)
            | PayoutError::Dispatch(_)
            | PayoutError::System(_) => true,
        }
    }
}

impl From<sqlx::Error> for PayoutError {
    fn from(e: sqlx::Error) -> Self {
        PayoutError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for PayoutError {
    fn from(e: anyhow::Error) -> Self {
        PayoutError::System(e.to_string())
    }
}

impl From<validator::ValidationErrors> for PayoutError {
    fn from(e: validator::ValidationErrors) -> Self {
        PayoutError::Validation(e.to_string())
    }
}
