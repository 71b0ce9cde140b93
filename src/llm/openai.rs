use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{CompletionProvider, DeltaReceiver, EmbeddingProvider, ProviderError};
use super::types::{ChatRequest, StreamDelta};
use crate::core::config::settings::OpenAiSettings;

/// Client for an OpenAI-compatible HTTP API. Serves both completions and
/// embeddings.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            embedding_model: settings.embedding_model.clone(),
            client: Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        Ok(res)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Done,
    Delta(StreamDelta),
}

/// Parses one `data:` line of the completion stream. Comments, keep-alives and
/// payloads without a choice yield `None`.
fn parse_sse_line(line: &str) -> Option<SseLine> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseLine::Done);
    }

    let payload: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Skipping unparsable stream line: {}", e);
            return None;
        }
    };
    let choice = payload.get("choices")?.get(0)?;

    Some(SseLine::Delta(StreamDelta {
        content: choice["delta"]["content"].as_str().map(str::to_string),
        finish_reason: choice["finish_reason"].as_str().map(str::to_string),
    }))
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<DeltaReceiver, ProviderError> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.top_p { obj.insert("top_p".to_string(), json!(t)); }
            if let Some(p) = request.frequency_penalty { obj.insert("frequency_penalty".to_string(), json!(p)); }
            if let Some(p) = request.presence_penalty { obj.insert("presence_penalty".to_string(), json!(p)); }
            if let Some(n) = request.n { obj.insert("n".to_string(), json!(n)); }
        }

        let res = self.post("/v1/chat/completions", &body).await?;

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            // Network chunks do not respect line or UTF-8 boundaries.
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::from(e))).await;
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw);
                    match parse_sse_line(line.trim()) {
                        Some(SseLine::Done) => return,
                        Some(SseLine::Delta(delta)) => {
                            if tx.send(Ok(delta)).await.is_err() {
                                return;
                            }
                        }
                        None => {}
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self.post("/v1/embeddings", &body).await?;
        let mut payload: EmbeddingResponse = res.json().await?;

        payload.data.sort_by_key(|item| item.index);
        if payload.data.len() != inputs.len() {
            return Err(ProviderError::Other(format!(
                "expected {} embeddings, received {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        Ok(payload.data.into_iter().map(|item| item.embedding).collect())
    }
}
