//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};

use crate::auth::AuthError;
use crate::response::ApiResponse;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing, invalid or revoked credentials.
    Unauthorized(String),
    /// The caller's role may not use the endpoint.
    Forbidden(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, ApiResponse::failed(message)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err.kind() {
        ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Conflict => match err {
            DomainError::Market(err) => (StatusCode::CONFLICT, err.to_string()),
            DomainError::Store(err) => {
                tracing::warn!(error = %err, "store conflict");
                (
                    StatusCode::CONFLICT,
                    "The item changed while the request was processed; please retry".to_string(),
                )
            }
        },
        ErrorKind::Persistence => {
            tracing::error!(error = %err, "persistence failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}
