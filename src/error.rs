use crate::database::DatabaseError;
use crate::gcp::CloudError;
use crate::ledger::LedgerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed or incomplete request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate records
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request understood but refused in the current state
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Ledger (blockchain) errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Google Cloud, Firebase and delivery provider errors
    #[error("Cloud service error: {0}")]
    Cloud(#[from] CloudError),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) | AppError::BadRequest(_) => 400,
            AppError::Cloud(CloudError::InvalidUpload(_)) => 400,
            AppError::Conflict(_) => 409,
            AppError::Unprocessable(_) => 422,
            AppError::Ledger(LedgerError::SealTimeout { .. }) => 504,
            AppError::Ledger(LedgerError::Cancelled(_)) => 503,
            AppError::Ledger(_) | AppError::Cloud(_) | AppError::ExternalService(_) => 502,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
        }
    }

    /// Message returned to the caller in the `error` field
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unprocessable(msg) => msg.clone(),
            AppError::Cloud(CloudError::InvalidUpload(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(status = status.as_u16(), "request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(msg),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // PostgreSQL error codes
                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation
                    Some("23503") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // check_violation
                    Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Conflict("x".into()).status_code(), 409);
        assert_eq!(AppError::Unprocessable("x".into()).status_code(), 422);
        assert_eq!(
            AppError::Ledger(LedgerError::SealTimeout {
                signature: "sig".into(),
                waited_secs: 120
            })
            .status_code(),
            504
        );
        assert_eq!(
            AppError::Ledger(LedgerError::Rpc("down".into())).status_code(),
            502
        );
        assert_eq!(
            AppError::Cloud(CloudError::InvalidUpload("file must be pdf".into())).status_code(),
            400
        );
    }

    #[test]
    fn test_public_message_strips_prefix_for_client_errors() {
        assert_eq!(
            AppError::NotFound("Mail not found".into()).public_message(),
            "Mail not found"
        );
        assert_eq!(
            AppError::Ledger(LedgerError::Rpc("down".into())).public_message(),
            "Ledger error: RPC error: down"
        );
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: AppError = RepositoryError::Duplicate("email".into()).into();
        assert_eq!(err.status_code(), 409);

        let err: RepositoryError = SqlxError::RowNotFound.into();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn test_option_to_result() {
        let found = option_to_result(Some(1), "missing");
        assert_eq!(found.unwrap(), 1);
        let missing: AppResult<i32> = option_to_result(None, "Piggy not found");
        assert!(missing.unwrap_err().is_not_found());
    }
}
