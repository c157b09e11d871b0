use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use ordina_core::TurnError;
use ordina_schema::{ChatRequest, ChatResponse};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(handle_chat))
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<serde_json::Value>)> {
    match state.pipeline.handle(request).await {
        Ok(response) => Ok(Json(response)),
        Err(TurnError::SessionNotFound(id)) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("session {id} not found") })),
        )),
        Err(TurnError::Internal(err)) => {
            tracing::error!(error = %err, "turn pipeline failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal server error" })),
            ))
        }
    }
}
