use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::RouterError;
use crate::models::{ChatInput, ModelConfig};
use crate::session::SessionController;

type AppState = Arc<SessionController>;

// ============================================================
// Error Handling
// ============================================================

/// Map a router error to a response. Model failures are logged in full but
/// only a generic message reaches the client.
fn router_error(e: RouterError) -> (StatusCode, String) {
    match e {
        RouterError::SessionNotFound(id) => {
            tracing::warn!("Chat for unknown session {}", id);
            (StatusCode::NOT_FOUND, "Session not found".to_string())
        }
        RouterError::Llm(e) => {
            tracing::error!("Language model error: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                "The language model is unavailable, please try again later".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(controller): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "sessions": controller.store().len(),
    }))
}

// ============================================================
// Sessions
// ============================================================

pub async fn create_session(
    State(controller): State<AppState>,
    headers: HeaderMap,
) -> Result<String, (StatusCode, String)> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let config = ModelConfig::from_headers(header("model"), header("temperature"))
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    Ok(controller.new_session(config).to_string())
}

// ============================================================
// Chat
// ============================================================

pub async fn chat(
    State(controller): State<AppState>,
    Json(input): Json<ChatInput>,
) -> Result<String, (StatusCode, String)> {
    let id = Uuid::parse_str(input.session_id.trim())
        .map_err(|_| (StatusCode::NOT_FOUND, "Session not found".to_string()))?;

    controller
        .ask(id, &input.message)
        .await
        .map(|outcome| outcome.answer)
        .map_err(router_error)
}
