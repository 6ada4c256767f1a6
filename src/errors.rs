//! # Error Module
//!
//! Application error taxonomy and its mapping onto HTTP responses.
//! Every error is rendered as `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::auth::jwt::{TokenError, ValidationFailure};

/// Errors surfaced by handlers and services
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, expired or revoked bearer token
    #[error(transparent)]
    Unauthorized(#[from] TokenError),

    /// Unknown username or wrong password. Both cases share one message.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Resource absent or owned by someone else
    #[error("{0}")]
    NotFound(String),

    #[error("User already exists")]
    DuplicateUser,

    /// Persistence or infrastructure failure; details are logged, never returned
    #[error("Internal server error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUser => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref err) = self {
            tracing::error!("Request failed: {:#}", err);
        }

        let body = json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<ValidationFailure> for AppError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Token(kind) => AppError::Unauthorized(kind),
            ValidationFailure::Store(e) => AppError::Internal(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("relation \"books\" does not exist"));
        let (status, body) = body_of(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn token_errors_map_to_unauthorized() {
        let (status, body) = body_of(TokenError::Revoked.into()).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Token has been revoked" }));
    }

    #[test]
    fn duplicate_user_is_bad_request() {
        assert_eq!(AppError::DuplicateUser.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("Book not found".into()).status(), StatusCode::NOT_FOUND);
    }
}
