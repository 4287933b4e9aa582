//! HTTP handlers for the relay API.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use super::api::HealthResponse;
use super::error::ApiError;
use crate::messenger::{ClaudeResponse, Messenger};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Messenger that runs the CLI calls.
    pub messenger: Messenger,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(messenger: Messenger) -> Self {
        Self { messenger }
    }
}

/// POST /api/chat - Relay one message to the Claude CLI.
///
/// # Errors
///
/// Returns an [`ApiError`] if the body is not a JSON object or the call fails.
pub async fn post_chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClaudeResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::invalid_request(rejection.body_text()))?;
    let Some(fields) = body.as_object() else {
        return Err(ApiError::invalid_request(
            "Request body must be a JSON object",
        ));
    };

    let response = state
        .messenger
        .send_json(fields.get("message"), fields.get("options"))
        .await?;
    Ok(Json(response))
}

/// GET /api/health - Liveness check.
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse::now())
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
