//! JWT Token Service
//!
//! Handles JWT creation, validation, and revocation for user authentication.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::revocation::RevocationStore;
use crate::database::models::User;

const ISSUER: &str = "bookshelf-server";

/// JWT Claims structure containing user information and token metadata
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Username of the token holder
    pub sub: String,
    /// User unique identifier
    pub uid: i64,
    /// Token identifier, the revocation key
    pub jti: String,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
}

/// Why a presented token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Missing Authorization Header")]
    Missing,

    #[error("Invalid token")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,
}

/// Freshly issued access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT Service for token operations
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    /// Create a new token service with the provided secret, lifetime and revocation store
    pub fn new(secret: &str, ttl: Duration, revocations: Arc<dyn RevocationStore>) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        // Expiry is checked by hand after the revocation lookup
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.validate_exp = false;

        Self {
            encoding_key,
            decoding_key,
            validation,
            ttl,
            revocations,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a token for a user
    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to encode JWT token")?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// Validate and decode a token.
    ///
    /// Revocation is checked before expiry, so a revoked token keeps reporting
    /// [`TokenError::Revoked`] after it would have expired. Revocation store
    /// failures come back as [`ValidationFailure::Store`].
    pub async fn validate(&self, token: &str) -> std::result::Result<Claims, ValidationFailure> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT decode failed: {}", e);
                ValidationFailure::Token(TokenError::Malformed)
            })?;

        if self.revocations.is_revoked(&claims.jti).await.map_err(ValidationFailure::Store)? {
            return Err(ValidationFailure::Token(TokenError::Revoked));
        }

        if Utc::now().timestamp() > claims.exp {
            return Err(ValidationFailure::Token(TokenError::Expired));
        }

        Ok(claims)
    }

    /// Revoke a token by its identifier. Idempotent.
    pub async fn revoke(&self, jti: &str) -> Result<()> {
        self.revocations.revoke(jti).await
    }
}

/// Outcome of a failed [`TokenService::validate`]
#[derive(Debug, thiserror::Error)]
pub enum ValidationFailure {
    #[error(transparent)]
    Token(TokenError),

    #[error(transparent)]
    Store(anyhow::Error),
}
