use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use ragchat_backend::core::config::AppPaths;
use ragchat_backend::core::logging;
use ragchat_backend::server;
use ragchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to read .env: {}", err);
        }
    }

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    let bind_addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
