use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{ChatRequest, StreamDelta};

/// Failure talking to a hosted model API, classified by cause.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("invalid request (status {status}): {message}")]
    InvalidRequest { status: u16, message: String },
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited(message),
            408 => ProviderError::Timeout(message),
            500..=599 => ProviderError::Api { status, message },
            400..=499 => ProviderError::InvalidRequest { status, message },
            _ => ProviderError::Other(format!("unexpected status {}: {}", status, message)),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_status(status.as_u16(), err.to_string())
        } else {
            ProviderError::Other(err.to_string())
        }
    }
}

pub type DeltaReceiver = mpsc::Receiver<Result<StreamDelta, ProviderError>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Opens a streaming chat completion. Each call opens a new stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaReceiver, ProviderError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}
