use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::services::messages;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GetMessagesForm {
    pub chat_id: Option<i64>,
    pub email: Option<String>,
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Form(form): Form<GetMessagesForm>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = messages::get_messages(&state.db, form.chat_id, form.email.as_deref()).await?;
    Ok(Json(json!({ "messages": messages })))
}
