//! Auth routes for registration, login, and logout

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use serde_json::{Value, json};

use crate::auth::models::{AuthUser, CredentialsForm, TokenResponse};
use crate::errors::{AppError, Result};
use crate::routes::FormOrDefault;
use crate::server::AppState;

const CREDENTIALS_REQUIRED: &str = "Username and password are required";

/// Register a new user from a `username`/`password` form
pub async fn register(
    State(state): State<AppState>,
    FormOrDefault(form): FormOrDefault<CredentialsForm>,
) -> Result<Json<Value>> {
    let (username, password) = form
        .into_parts()
        .ok_or_else(|| AppError::Validation(CREDENTIALS_REQUIRED.to_string()))?;

    state.credentials.register(&username, &password).await?;

    Ok(Json(json!({ "message": "User registered successfully" })))
}

/// Verify credentials and issue an access token
pub async fn login(
    State(state): State<AppState>,
    FormOrDefault(form): FormOrDefault<CredentialsForm>,
) -> Result<Json<TokenResponse>> {
    let (username, password) = form
        .into_parts()
        .ok_or_else(|| AppError::Validation(CREDENTIALS_REQUIRED.to_string()))?;

    let user = state.credentials.verify(&username, &password).await?;
    let issued = state.tokens.issue(&user)?;

    tracing::info!(
        "User {} logged in, token jti={} expires at {}",
        user.username,
        issued.jti,
        issued.expires_at
    );

    Ok(Json(TokenResponse::new(
        issued.token,
        state.tokens.ttl().num_seconds(),
        issued.expires_at.timestamp(),
    )))
}

/// Revoke the token the request was made with
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>> {
    state.tokens.revoke(&user.jti).await?;
    tracing::info!("User {} logged out", user.username);

    Ok(Json(json!({ "message": "Token revoked" })))
}

/// Routes that do not require a token
pub fn create_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes that must sit behind the auth middleware
pub fn create_session_routes() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}
