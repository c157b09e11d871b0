use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use ordina_schema::Message;

use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionHistory {
    pub session_id: Uuid,
    pub messages: Vec<Message>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_session).delete(clear_session))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionHistory>, (StatusCode, Json<serde_json::Value>)> {
    match state.sessions.get(id).await {
        Ok(messages) => Ok(Json(SessionHistory {
            session_id: id,
            messages,
        })),
        Err(_) => Err(not_found(id)),
    }
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    match state.pipeline.clear_session(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(not_found(id)),
    }
}

fn not_found(id: Uuid) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("session {id} not found") })),
    )
}
