//! Error types for the authentication service

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::validation::FieldErrors;
use serde_json::json;
use thiserror::Error;

/// Failures of account operations
#[derive(Error, Debug)]
pub enum AccountError {
    /// Users must have an email address
    #[error("Users must have an email address")]
    MissingEmail,

    /// Another account already uses this email
    #[error("A user with email {0} already exists")]
    EmailTaken(String),

    /// The password could not be hashed
    #[error("Failed to hash password: {0}")]
    PasswordHash(String),

    /// Error raised by the backing store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// HTTP-facing error of the authentication service
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or invalid bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// The authenticated account no longer exists
    #[error("Not found")]
    NotFound,

    /// Per-field validation failure
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Body that is not JSON
    #[error("Rejected request ({0}): {1}")]
    Rejected(StatusCode, String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl From<FieldErrors> for AuthError {
    fn from(errors: FieldErrors) -> Self {
        AuthError::Validation(errors)
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            ),
            AuthError::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))),
            AuthError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(json!(errors))),
            AuthError::Rejected(status, msg) => (status, Json(json!({ "error": msg }))),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            ),
        };

        (status, body).into_response()
    }
}

/// Type alias for handler results
pub type AuthResult<T> = Result<T, AuthError>;
