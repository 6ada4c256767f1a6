//! Authentication Middleware
//!
//! Axum middleware for bearer token validation and user authentication.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::{
    jwt::{TokenError, ValidationFailure},
    models::AuthUser,
};
use crate::errors::AppError;
use crate::server::AppState;

/// Authentication middleware that validates bearer tokens and injects user info
pub struct AuthMiddleware;

impl AuthMiddleware {
    /// Middleware function for validating bearer tokens
    pub async fn validate_token(
        State(state): State<AppState>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, AppError> {
        let token = match bearer_token(&req) {
            Some(token) => token.to_string(),
            None => {
                tracing::warn!(
                    "[AuthMiddleware] Missing Authorization header: {} {}",
                    req.method(),
                    req.uri()
                );
                return Err(TokenError::Missing.into());
            }
        };

        let claims = match state.tokens.validate(&token).await {
            Ok(claims) => claims,
            Err(failure) => {
                if let ValidationFailure::Token(kind) = &failure {
                    tracing::warn!(
                        "[AuthMiddleware] Rejected token for {} {}: {}",
                        req.method(),
                        req.uri(),
                        kind
                    );
                }
                return Err(failure.into());
            }
        };

        let auth_user = AuthUser::from(claims);
        tracing::debug!(
            "[AuthMiddleware] Authenticated id={} username={}",
            auth_user.id,
            auth_user.username
        );

        // Insert the user into request extensions for downstream handlers
        req.extensions_mut().insert(auth_user);

        Ok(next.run(req).await)
    }
}

/// Token from an `Authorization: Bearer <token>` header
fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
