use axum::response::Json;
use serde_json::json;

/// Health check endpoint handler.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
/// - **Response**: JSON object with status field
///
/// # Response Format
/// ```json
/// {
///   "status": "pong"
/// }
/// ```
///
/// Used by load balancers and container orchestrators; it does not touch the
/// database or require a token.
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong" }))
}
