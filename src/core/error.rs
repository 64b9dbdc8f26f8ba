use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::core::Currency;
use crate::modules::fee_schemas::models::SchemaViolation;

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Validation errors for request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fee schema submission broke one of the allocation invariants
    #[error("Fee schema rejected: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    /// No active fee schema exists for the merchant at allocation time
    #[error("No active fee schema for merchant '{merchant_id}'")]
    SchemaNotFound { merchant_id: String },

    /// A single record could not be allocated during a settlement run
    #[error("Record '{record_id}' failed: {reason}")]
    RecordProcessing { record_id: String, reason: String },

    /// Unrecoverable error that aborts a whole settlement run
    #[error("Settlement run aborted: {0}")]
    RunFatal(String),

    /// Inputs of a single-currency computation carried another currency
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current resource state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SchemaViolation(_) => StatusCode::BAD_REQUEST,
            AppError::SchemaNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RecordProcessing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RunFatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CurrencyMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn run_fatal(msg: impl Into<String>) -> Self {
        AppError::RunFatal(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn record(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::RecordProcessing {
            record_id: record_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only concerns a single record and the run may continue
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            AppError::RecordProcessing { .. }
                | AppError::SchemaNotFound { .. }
                | AppError::CurrencyMismatch { .. }
        )
    }
}
