use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::errors::PipelineError;
use crate::db::Database;
use crate::llm::{
    CompletionProvider, CompletionStreamer, EmbeddingProvider, OpenAiClient, TokenCounter,
    UnitPricing,
};
use crate::pipeline::QueryPipeline;
use crate::rag::{EmbeddingBatcher, TokenTextSplitter};
use crate::services::auth::OAuthClient;

pub mod error;

use error::InitializationError;

/// Process-wide context built once at start-up and handed to every route.
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: Database,
    pub batcher: EmbeddingBatcher,
    pub query: Arc<QueryPipeline>,
    pub oauth: OAuthClient,
}

impl AppState {
    /// Loads settings, opens the database and connects the hosted model API.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;
        tracing::info!(
            "Effective configuration: {}",
            config.redact_sensitive_values(&settings)
        );

        let db = Database::connect(&settings.database.url, settings.database.max_connections)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        let client = Arc::new(OpenAiClient::new(&settings.openai));
        Self::from_parts(paths, settings, db, client.clone(), client)
    }

    /// Wires components around already-constructed providers.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        settings: Settings,
        db: Database,
        completion: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let tokens = TokenCounter::for_model(&settings.openai.tokenizer_model)
            .map_err(|e| InitializationError::Tokenizer(PipelineError::from(e).into()))?;

        let splitter = TokenTextSplitter::new(
            tokens.clone(),
            settings.retrieval.chunk_size,
            settings.retrieval.chunk_overlap,
        );
        let batcher = EmbeddingBatcher::new(
            db.clone(),
            embedder.clone(),
            splitter,
            paths.clone(),
            settings.retrieval.batch_size,
        );

        let streamer = CompletionStreamer::new(completion, tokens, settings.openai.clone());
        let pricing = UnitPricing {
            input: settings.openai.input_unit_cost,
            output: settings.openai.output_unit_cost,
        };
        let query = Arc::new(QueryPipeline::new(
            db.clone(),
            paths.clone(),
            embedder,
            streamer,
            pricing,
            settings.retrieval.top_k,
        ));

        let oauth = OAuthClient::new(settings.oauth.clone());

        Ok(Arc::new(AppState {
            settings: Arc::new(settings),
            db,
            batcher,
            query,
            oauth,
        }))
    }
}
