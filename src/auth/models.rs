//! Authentication Models
//!
//! Data structures for authentication requests, responses, and user information.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{Claims, TokenError};
use crate::errors::AppError;

/// Authenticated user information extracted from a validated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    /// Identifier of the token the request was made with
    pub jti: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.uid,
            username: claims.sub,
            jti: claims.jti,
        }
    }
}

/// Reads the identity placed in request extensions by the auth middleware.
/// Using it on a route without the middleware yields 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::Unauthorized(TokenError::Missing))
    }
}

/// Registration and login form. Fields are optional so a missing field is
/// reported as a 400 with a readable message.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsForm {
    /// Both fields, if present and non-empty
    pub fn into_parts(self) -> Option<(String, String)> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        }
    }
}

/// Token response after successful authentication
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    /// Expiry as a unix timestamp
    pub expires_at: i64,
}

impl TokenResponse {
    pub fn new(access_token: String, expires_in: i64, expires_at: i64) -> Self {
        Self {
            message: "Login successful".to_string(),
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_count_as_missing() {
        let form = CredentialsForm {
            username: Some("alice".into()),
            password: Some(String::new()),
        };
        assert!(form.into_parts().is_none());

        let form = CredentialsForm {
            username: Some("alice".into()),
            password: None,
        };
        assert!(form.into_parts().is_none());
    }

    #[test]
    fn complete_form_yields_both_fields() {
        let form = CredentialsForm {
            username: Some("alice".into()),
            password: Some("pw".into()),
        };
        assert_eq!(form.into_parts(), Some(("alice".to_string(), "pw".to_string())));
    }
}
