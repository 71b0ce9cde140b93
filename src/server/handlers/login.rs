use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;

use crate::core::messages;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: String,
}

pub async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    tracing::info!("Action: login");
    Redirect::to(&state.oauth.login_url())
}

/// Completes the code exchange and sends the browser back to the front end.
pub async fn oauth_code(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<OAuthCallback>,
) -> Redirect {
    tracing::info!("Action: authorize");
    match state.oauth.authorize(&callback.code).await {
        Ok(email) => Redirect::to(&state.oauth.success_url(&email)),
        Err(err) => {
            tracing::error!("{}", messages::general(&err));
            Redirect::to(state.oauth.error_url())
        }
    }
}
