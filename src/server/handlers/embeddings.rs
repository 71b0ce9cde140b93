use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::messages;
use crate::rag::EmbeddingRun;
use crate::state::AppState;

pub async fn create_embedding(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Action: create_embedding");
    let message = match state.batcher.create_embeddings_for_new_rows().await? {
        EmbeddingRun::NothingToDo => messages::SUCCESS_MESSAGE_NO_NEW_DATA_FOR_EMBEDDING,
        EmbeddingRun::Created { .. } => messages::SUCCESS_MESSAGE_EMBEDDING_FILES_CREATION,
    };
    Ok(Json(json!({ "message": message })))
}
