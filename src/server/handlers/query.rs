use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::Deserialize;

use crate::pipeline::QueryRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryPayload {
    pub chat_id: Option<i64>,
    pub email: Option<String>,
    pub query: Option<String>,
}

/// Streams the pipeline's events as server-sent events, one JSON object each.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryPayload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.query.answer(QueryRequest {
        chat_id: payload.chat_id,
        email: payload.email,
        query: payload.query,
    });

    let stream = stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok(Event::default().data(event.to_json())), events))
    });
    Sse::new(stream)
}
