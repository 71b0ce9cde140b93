use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::messages;
use crate::services::datastore;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// Accepts a multipart form whose `file` field carries the spreadsheet.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        datastore::upload_file(&state.db, &filename, bytes.to_vec()).await?;
        return Ok(Json(json!({ "message": messages::SUCCESS_MESSAGE_FILE_UPLOAD })));
    }

    Err(ApiError::BadRequest(messages::ERROR_MESSAGE_NOT_EXCEL_FILE.to_string()))
}
