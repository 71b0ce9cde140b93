use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use super::messages;

/// Error returned by HTTP handlers. Always rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Wraps an unclassified failure into the general template.
    pub fn general<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(messages::general(err))
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failure of a persistence operation.
#[derive(Debug, Error)]
#[error("Database exception occurred. {0}")]
pub struct DatabaseError(pub String);

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError(err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Failures of the embedding and retrieval pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{}", messages::fill(messages::ERROR_MESSAGE_EMBEDDING_SAVE_EXCEPTION, .0))]
    ShardSave(String),
    #[error("{}", messages::fill(messages::ERROR_MESSAGE_VECTORSTORE_LOAD_EXCEPTION, .0))]
    IndexLoad(String),
    #[error("{}", messages::fill(messages::ERROR_MESSAGE_TOKENIZER, .0))]
    Tokenizer(String),
    #[error("{}", messages::ERROR_MESSAGE_ZERO_CHUNKS)]
    ZeroChunks,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ZeroChunks => {
                ApiError::BadRequest(messages::ERROR_MESSAGE_ZERO_CHUNKS.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<crate::llm::tokens::TokenizationError> for PipelineError {
    fn from(err: crate::llm::tokens::TokenizationError) -> Self {
        PipelineError::Tokenizer(err.reason)
    }
}

/// The referenced chat does not exist.
#[derive(Debug, Error)]
#[error("{}", messages::chat_not_found(.0))]
pub struct ChatNotFound(pub i64);

impl From<ChatNotFound> for ApiError {
    fn from(err: ChatNotFound) -> Self {
        ApiError::NotFound(err.to_string())
    }
}
