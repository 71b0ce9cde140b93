//! Answers one chat query: validate, retrieve, generate, persist.
//!
//! Progress is reported as [`QueryEvent`]s on a channel while the work runs on
//! its own task. Chat and history are read before generation on a connection
//! that is released again; the finished turn is written in one short
//! transaction, so a failure anywhere leaves no trace in the database.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use super::events::QueryEvent;
use super::language::detect_language;
use super::prompt::{build_message_list, render_context};
use crate::core::config::AppPaths;
use crate::core::errors::{ChatNotFound, DatabaseError, PipelineError};
use crate::core::messages;
use crate::db::{self, Database, MessageType, NewMessageLog};
use crate::llm::provider::EmbeddingProvider;
use crate::llm::streamer::{CompletionChunk, CompletionOutcome, CompletionStreamer};
use crate::llm::tokens::UnitPricing;
use crate::rag::load_merged_index;
use crate::services::chat::{get_chat, ChatLookupError};

#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub chat_id: Option<i64>,
    pub email: Option<String>,
    pub query: Option<String>,
}

struct ValidQuery {
    chat_id: i64,
    email: String,
    query: String,
}

impl QueryRequest {
    /// Checks query, email and chat id in that order. Only the first missing
    /// field is reported.
    fn validate(self) -> Result<ValidQuery, &'static str> {
        let query = present(self.query).ok_or(messages::ERROR_MESSAGE_EMPTY_QUERY)?;
        let email = present(self.email).ok_or(messages::ERROR_MESSAGE_EMPTY_EMAIL)?;
        let chat_id = self.chat_id.ok_or(messages::ERROR_MESSAGE_EMPTY_CHATID)?;
        Ok(ValidQuery {
            chat_id,
            email,
            query,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Error)]
enum QueryError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    NotFound(#[from] ChatNotFound),
    #[error("{}", messages::general(.0))]
    Other(String),
}

impl From<ChatLookupError> for QueryError {
    fn from(err: ChatLookupError) -> Self {
        match err {
            ChatLookupError::NotFound(err) => QueryError::NotFound(err),
            ChatLookupError::Database(err) => QueryError::Database(err),
        }
    }
}

pub struct QueryPipeline {
    db: Database,
    paths: Arc<AppPaths>,
    embedder: Arc<dyn EmbeddingProvider>,
    streamer: CompletionStreamer,
    pricing: UnitPricing,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        db: Database,
        paths: Arc<AppPaths>,
        embedder: Arc<dyn EmbeddingProvider>,
        streamer: CompletionStreamer,
        pricing: UnitPricing,
        top_k: usize,
    ) -> Self {
        Self {
            db,
            paths,
            embedder,
            streamer,
            pricing,
            top_k,
        }
    }

    /// Starts answering `request`. The channel closes once the turn is
    /// persisted or has failed.
    pub fn answer(self: &Arc<Self>, request: QueryRequest) -> mpsc::Receiver<QueryEvent> {
        let (tx, rx) = mpsc::channel(32);
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.run(request, &tx).await;
        });
        rx
    }

    async fn run(&self, request: QueryRequest, events: &mpsc::Sender<QueryEvent>) {
        tracing::info!("Action: get_query_answer");

        let valid = match request.validate() {
            Ok(valid) => valid,
            Err(message) => {
                tracing::info!("{}", message);
                emit(events, QueryEvent::invalid(message)).await;
                return;
            }
        };

        if let Err(err) = self.execute(valid, events).await {
            tracing::error!("{}", err);
            emit(events, QueryEvent::answer(err.to_string())).await;
        }
    }

    async fn execute(
        &self,
        request: ValidQuery,
        events: &mpsc::Sender<QueryEvent>,
    ) -> Result<(), QueryError> {
        let folder = self.paths.embeddings_dir.clone();
        let index = tokio::task::spawn_blocking(move || load_merged_index(&folder))
            .await
            .map_err(|e| QueryError::Other(e.to_string()))??;
        emit(events, QueryEvent::processing(messages::PROGRESS_MESSAGE_SEARCHING)).await;

        let query_vector = self
            .embedder
            .embed(std::slice::from_ref(&request.query))
            .await
            .map_err(|e| QueryError::Other(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::Other("no embedding returned for query".to_string()))?;
        let hits = index.similarity_search(&query_vector, self.top_k);

        let history = {
            let mut conn = self.db.acquire().await?;
            let chat = get_chat(&mut conn, request.chat_id).await?;
            if chat.user != request.email {
                tracing::debug!(
                    "Chat {} queried by {}, owned by {}",
                    chat.id,
                    request.email,
                    chat.user
                );
            }
            db::list_messages(&mut conn, request.chat_id).await?
        };
        let language = detect_language(&request.query);

        let message_list =
            build_message_list(&history, language, &render_context(&hits), &request.query);
        tracing::debug!("Message list: {:?}", message_list);

        emit(events, QueryEvent::processing(messages::PROGRESS_MESSAGE_GENERATING)).await;
        let (answer, outcome) = self.generate(message_list, events).await?;

        let usage = outcome.usage;
        let total_cost = self
            .pricing
            .estimate_cost(Some(usage.prompt_tokens), Some(usage.completion_tokens));
        tracing::info!("Response: {}", answer);
        tracing::info!(
            "Query Log: prompt_tokens:{}, completion_tokens:{}, total_tokens:{}, total_cost:{}, response_time:{}, has_error:{}",
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
            total_cost,
            outcome.response_time,
            outcome.has_error()
        );

        let mut tx = self.db.begin().await?;
        let user_message =
            db::insert_message(&mut tx, request.chat_id, MessageType::User, &request.query).await?;
        db::insert_message(&mut tx, request.chat_id, MessageType::Assistant, &answer).await?;
        db::insert_message_log(
            &mut tx,
            &NewMessageLog {
                message_id: user_message.id,
                model: self.streamer.model().to_string(),
                prompt_tokens: usage.prompt_tokens as i64,
                completion_tokens: usage.completion_tokens as i64,
                total_tokens: usage.total_tokens as i64,
                total_cost,
                response_time: outcome.response_time,
                has_error: outcome.has_error(),
            },
        )
        .await?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    /// Forwards every non-empty fragment and returns the full answer text.
    async fn generate(
        &self,
        message_list: Vec<crate::llm::types::ChatMessage>,
        events: &mpsc::Sender<QueryEvent>,
    ) -> Result<(String, CompletionOutcome), QueryError> {
        let mut chunks = self.streamer.stream(message_list);
        let mut answer = String::new();
        let mut outcome = None;

        while let Some(chunk) = chunks.recv().await {
            let text = match chunk {
                CompletionChunk::Delta(text) => text,
                CompletionChunk::Done(done) => {
                    let text = done.text.clone();
                    outcome = Some(done);
                    text
                }
            };
            if !text.is_empty() {
                answer.push_str(&text);
                emit(events, QueryEvent::answer(text)).await;
            }
        }

        let outcome = outcome
            .ok_or_else(|| QueryError::Other("completion stream ended unexpectedly".to_string()))?;
        Ok((answer, outcome))
    }
}

/// A client that went away does not stop the turn from being recorded.
async fn emit(events: &mpsc::Sender<QueryEvent>, event: QueryEvent) {
    if events.send(event).await.is_err() {
        tracing::debug!("Query event dropped: receiver closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_database;
    use crate::llm::provider::ProviderError;
    use crate::llm::streamer::testing::ScriptedCompletion;
    use crate::llm::tokens::TokenCounter;
    use crate::core::config::settings::OpenAiSettings;
    use crate::pipeline::events::EventStatus;
    use crate::rag::batcher::testing::HashEmbedder;
    use crate::rag::{ChunkMetadata, Document, VectorIndex};
    use std::time::Duration;

    struct Fixture {
        db: Database,
        _root: tempfile::TempDir,
        pipeline: Arc<QueryPipeline>,
    }

    fn knowledge(title: &str, text: &str) -> Document {
        Document {
            page_content: text.to_string(),
            metadata: ChunkMetadata {
                source: format!("https://example.test/{}", title.to_lowercase()),
                title: title.to_string(),
                ..ChunkMetadata::default()
            },
        }
    }

    /// Seeds `documents` chunks split over two shards; zero leaves the
    /// embeddings folder absent.
    async fn fixture(completion: ScriptedCompletion, documents: usize) -> Fixture {
        let db = temp_database().await;
        let root = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_root(root.path()));

        if documents > 0 {
            let folder = paths.ensure_embeddings_dir().unwrap();
            let mut docs = vec![knowledge("Refunds", "Refunds\nRefunds are issued within 14 days.")];
            docs.extend(
                (1..documents).map(|i| knowledge(&format!("Topic-{}", i), &format!("Topic {} notes.", i))),
            );
            let second = docs.split_off(docs.len().div_ceil(2));
            for (name, shard) in [("seed-a", docs), ("seed-b", second)] {
                if shard.is_empty() {
                    continue;
                }
                let vectors = shard.iter().map(|d| HashEmbedder::vector(&d.page_content)).collect();
                VectorIndex::new(shard, vectors).unwrap().save(folder, name).unwrap();
            }
        }

        let settings = OpenAiSettings::default();
        let streamer = CompletionStreamer::new(
            Arc::new(completion),
            TokenCounter::for_model("gpt-3.5-turbo").unwrap(),
            settings.clone(),
        );
        let pipeline = QueryPipeline::new(
            db.clone(),
            paths,
            Arc::new(HashEmbedder::new()),
            streamer,
            UnitPricing {
                input: settings.input_unit_cost,
                output: settings.output_unit_cost,
            },
            32,
        );

        Fixture {
            db,
            _root: root,
            pipeline: Arc::new(pipeline),
        }
    }

    async fn drain(pipeline: &Arc<QueryPipeline>, request: QueryRequest) -> Vec<QueryEvent> {
        let mut rx = pipeline.answer(request);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn request(chat_id: Option<i64>, email: Option<&str>, query: Option<&str>) -> QueryRequest {
        QueryRequest {
            chat_id,
            email: email.map(str::to_string),
            query: query.map(str::to_string),
        }
    }

    async fn new_chat(db: &Database) -> i64 {
        let mut conn = db.pool().acquire().await.unwrap();
        db::insert_chat(&mut conn, "u@x.com").await.unwrap().id
    }

    #[tokio::test]
    async fn answered_query_streams_and_persists_one_turn() {
        let fx = fixture(ScriptedCompletion::answering(&["Refunds ", "take 14 days."], "stop"), 1).await;
        let chat_id = new_chat(&fx.db).await;

        let events = drain(
            &fx.pipeline,
            request(Some(chat_id), Some("u@x.com"), Some("What is the refund policy?")),
        )
        .await;

        assert_eq!(events[0], QueryEvent::processing(messages::PROGRESS_MESSAGE_SEARCHING));
        assert_eq!(events[1], QueryEvent::processing(messages::PROGRESS_MESSAGE_GENERATING));
        let answer: String = events[2..]
            .iter()
            .inspect(|e| assert_eq!(e.status, EventStatus::Answer))
            .filter_map(|e| e.message.clone())
            .collect();
        assert_eq!(answer, "Refunds take 14 days.");

        let mut conn = fx.db.pool().acquire().await.unwrap();
        let stored = db::list_messages(&mut conn, chat_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].message_type, "user");
        assert_eq!(stored[0].content, "What is the refund policy?");
        assert_eq!(stored[1].content, "Refunds take 14 days.");

        let logs = db::message_logs_for(&mut conn, stored[0].id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].has_error);
        assert!(logs[0].total_cost > 0.0);
        assert_eq!(logs[0].total_tokens, logs[0].prompt_tokens + logs[0].completion_tokens);
    }

    #[tokio::test]
    async fn missing_fields_emit_one_error_event() {
        let fx = fixture(ScriptedCompletion::answering(&[], "stop"), 1).await;

        let cases = [
            (request(Some(1), Some("u@x.com"), None), messages::ERROR_MESSAGE_EMPTY_QUERY),
            (request(Some(1), None, Some("q")), messages::ERROR_MESSAGE_EMPTY_EMAIL),
            (request(None, Some("u@x.com"), Some("q")), messages::ERROR_MESSAGE_EMPTY_CHATID),
            (request(None, None, None), messages::ERROR_MESSAGE_EMPTY_QUERY),
        ];
        for (req, expected) in cases {
            let events = drain(&fx.pipeline, req).await;
            assert_eq!(events, vec![QueryEvent::invalid(expected)]);
        }
    }

    #[tokio::test]
    async fn unknown_chat_rolls_back_with_answer_event() {
        let fx = fixture(ScriptedCompletion::answering(&["x"], "stop"), 1).await;

        let events = drain(&fx.pipeline, request(Some(99), Some("u@x.com"), Some("q"))).await;
        let last = events.last().unwrap();
        assert_eq!(last.status, EventStatus::Answer);
        assert_eq!(last.message.as_deref(), Some("Chat with id 99 not found."));

        let mut conn = fx.db.pool().acquire().await.unwrap();
        assert!(db::list_messages(&mut conn, 99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_index_is_reported_as_load_error() {
        let fx = fixture(ScriptedCompletion::answering(&["x"], "stop"), 0).await;
        let chat_id = new_chat(&fx.db).await;

        let events = drain(&fx.pipeline, request(Some(chat_id), Some("u@x.com"), Some("q"))).await;
        assert_eq!(events.len(), 1);
        assert!(events[0]
            .message
            .as_deref()
            .unwrap()
            .starts_with("Error on loading vectorstore."));
    }

    #[tokio::test]
    async fn provider_failure_is_persisted_with_error_flag() {
        let fx = fixture(
            ScriptedCompletion::rejecting(ProviderError::Timeout("slow".to_string())),
            1,
        )
        .await;
        let chat_id = new_chat(&fx.db).await;

        let events = drain(&fx.pipeline, request(Some(chat_id), Some("u@x.com"), Some("q"))).await;
        let last = events.last().unwrap().message.clone().unwrap();
        assert!(last.starts_with("Timeout : "));

        let mut conn = fx.db.pool().acquire().await.unwrap();
        let stored = db::list_messages(&mut conn, chat_id).await.unwrap();
        assert_eq!(stored[1].content, last);
        let logs = db::message_logs_for(&mut conn, stored[0].id).await.unwrap();
        assert!(logs[0].has_error);
    }

    #[tokio::test]
    async fn context_is_capped_at_top_k_chunks() {
        let completion = ScriptedCompletion::answering(&["ok"], "stop");
        let seen = completion.seen.clone();
        let fx = fixture(completion, 40).await;
        let chat_id = new_chat(&fx.db).await;

        drain(&fx.pipeline, request(Some(chat_id), Some("u@x.com"), Some("Topic 7?"))).await;

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages.last().unwrap().content;
        assert_eq!(prompt.matches("Source: https://example.test/").count(), 32);
    }

    #[tokio::test]
    async fn overlapping_turns_are_both_persisted() {
        let completion = ScriptedCompletion::answering(&["Refunds ", "take 14 days."], "stop")
            .with_pause(Duration::from_millis(200));
        let fx = fixture(completion, 1).await;
        let first = new_chat(&fx.db).await;
        let second = new_chat(&fx.db).await;

        let (a, b) = tokio::join!(
            drain(&fx.pipeline, request(Some(first), Some("u@x.com"), Some("Refunds?"))),
            drain(&fx.pipeline, request(Some(second), Some("u@x.com"), Some("Refund time?"))),
        );
        for events in [&a, &b] {
            let last = events.last().unwrap().message.clone().unwrap();
            assert_eq!(last, "take 14 days.");
        }

        let mut conn = fx.db.pool().acquire().await.unwrap();
        for chat_id in [first, second] {
            let stored = db::list_messages(&mut conn, chat_id).await.unwrap();
            assert_eq!(stored.len(), 2);
            assert_eq!(stored[1].content, "Refunds take 14 days.");
        }
    }
}
