use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::services::chat;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub email: Option<String>,
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_id = chat::create_chat(&state.db, payload.email.as_deref()).await?;
    Ok(Json(json!({ "chat_id": chat_id })))
}
