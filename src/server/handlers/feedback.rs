use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::services::feedback;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFeedbackRequest {
    pub chat_id: Option<i64>,
    pub content: Option<String>,
    pub rating: Option<i64>,
}

pub async fn create_feedback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let feedback_id = feedback::create_feedback(
        &state.db,
        payload.chat_id,
        payload.content.as_deref(),
        payload.rating,
    )
    .await?;
    Ok(Json(json!({ "feedback_id": feedback_id })))
}
