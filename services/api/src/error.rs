//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{error::DatabaseError, verification::VerificationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or incomplete input
    #[error("{0}")]
    Validation(String),

    /// The subject never started the bot, so no code can reach it
    #[error("{0}")]
    NotLinked(String),

    /// The submitted code was not accepted
    #[error("{0}")]
    InvalidCode(String),

    #[error("{0}")]
    NotFound(String),

    /// The request clashes with the current state, e.g. a taken seat
    #[error("{0}")]
    Conflict(String),

    #[error("Too many attempts, try again later")]
    TooManyRequests,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// True for the errors a wrong or stale code produces
    pub fn is_code_rejection(&self) -> bool {
        matches!(self, ApiError::InvalidCode(_))
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotLinked => ApiError::NotLinked(err.to_string()),
            VerificationError::NoCode
            | VerificationError::Expired
            | VerificationError::WrongCode
            | VerificationError::AlreadyUsed => ApiError::InvalidCode(err.to_string()),
            VerificationError::Database(e) => ApiError::Database(e),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::Query(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotLinked(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InvalidCode(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts, try again later".to_string(),
            ),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_errors_map_to_client_errors() {
        assert!(matches!(
            ApiError::from(VerificationError::NotLinked),
            ApiError::NotLinked(_)
        ));
        let err = ApiError::from(VerificationError::AlreadyUsed);
        assert!(err.is_code_rejection());
        assert_eq!(err.to_string(), "Code already used");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::validation("bad"), StatusCode::BAD_REQUEST),
            (ApiError::not_found("gone"), StatusCode::NOT_FOUND),
            (ApiError::conflict("taken"), StatusCode::CONFLICT),
            (ApiError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (
                ApiError::Database(DatabaseError::Decode("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
