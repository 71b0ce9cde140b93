//! Streams a chat completion and folds its terminal condition into one final
//! record carrying usage, timing and an error classification.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::provider::{CompletionProvider, ProviderError};
use super::tokens::TokenCounter;
use super::types::{serialize_messages, ChatMessage, ChatRequest};
use crate::core::config::settings::OpenAiSettings;
use crate::core::messages;

/// Why a completion did not end cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFailure {
    ProviderApi,
    Timeout,
    RateLimited,
    Connection,
    InvalidRequest,
    Unexpected,
    Length,
    ContentFilter,
    Incomplete,
}

impl CompletionFailure {
    /// `stop` and unrecognised reasons are clean finishes. A stream that ends
    /// without any reason is incomplete.
    pub fn from_finish_reason(reason: Option<&str>) -> Option<Self> {
        match reason {
            None | Some("null") => Some(CompletionFailure::Incomplete),
            Some("length") => Some(CompletionFailure::Length),
            Some("content_filter") => Some(CompletionFailure::ContentFilter),
            Some(_) => None,
        }
    }

    pub fn from_provider_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::Api { .. } => CompletionFailure::ProviderApi,
            ProviderError::Timeout(_) => CompletionFailure::Timeout,
            ProviderError::RateLimited(_) => CompletionFailure::RateLimited,
            ProviderError::Connection(_) => CompletionFailure::Connection,
            ProviderError::InvalidRequest { .. } => CompletionFailure::InvalidRequest,
            ProviderError::Other(_) => CompletionFailure::Unexpected,
        }
    }

    /// Internal code written to the log.
    pub fn code(&self) -> &'static str {
        match self {
            CompletionFailure::ProviderApi => messages::ERR_MSG_OPEN_AI_API_ERROR,
            CompletionFailure::Timeout => messages::ERR_MSG_OPEN_AI_TIMEOUT,
            CompletionFailure::RateLimited => messages::ERR_MSG_OPEN_AI_RATE_LIMIT_ERROR,
            CompletionFailure::Connection => messages::ERR_MSG_OPEN_AI_API_CONNECTION_ERROR,
            CompletionFailure::InvalidRequest | CompletionFailure::Unexpected => {
                messages::ERR_MSG_OPEN_AI_OTHERS_ERROR
            }
            CompletionFailure::Length => messages::ERR_MSG_TOKEN_LENGTH,
            CompletionFailure::ContentFilter => messages::ERR_MSG_CONTENT_FILTER,
            CompletionFailure::Incomplete => messages::ERR_MSG_CONTENT_NULL,
        }
    }

    /// Text shown to the user in place of the final fragment.
    pub fn display_message(&self) -> String {
        match self {
            CompletionFailure::ProviderApi => {
                format!("APIError : {}", messages::DISP_MSG_OPEN_AI_RETRY)
            }
            CompletionFailure::Timeout => format!("Timeout : {}", messages::DISP_MSG_OPEN_AI_RETRY),
            CompletionFailure::RateLimited => {
                format!("RateLimitError : {}", messages::DISP_MSG_OPEN_AI_RATE_LIMIT)
            }
            CompletionFailure::Connection => format!(
                "APIConnectionError : {}",
                messages::DISP_MSG_OPEN_AI_API_CONNECTION_ERROR
            ),
            CompletionFailure::InvalidRequest => format!(
                "InvalidRequestError : {}",
                messages::DISP_MSG_OPEN_AI_OTHERS_ERROR
            ),
            CompletionFailure::Unexpected => {
                format!("Exception : {}", messages::DISP_MSG_OPEN_AI_OTHERS_ERROR)
            }
            CompletionFailure::Length => format!(" {}", messages::DISP_MSG_TOKEN_LENGTH),
            CompletionFailure::ContentFilter => format!(" {}", messages::DISP_MSG_CONTENT_FILTER),
            CompletionFailure::Incomplete => format!(" {}", messages::DISP_MSG_CONTENT_NULL),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Terminal record of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// Closing fragment: empty on a clean finish, the failure text otherwise.
    pub text: String,
    pub usage: TokenUsage,
    /// Seconds from request to the end of the stream.
    pub response_time: f64,
    pub failure: Option<CompletionFailure>,
}

impl CompletionOutcome {
    pub fn has_error(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    Delta(String),
    Done(CompletionOutcome),
}

#[derive(Clone)]
pub struct CompletionStreamer {
    provider: Arc<dyn CompletionProvider>,
    tokens: TokenCounter,
    settings: OpenAiSettings,
}

impl CompletionStreamer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tokens: TokenCounter,
        settings: OpenAiSettings,
    ) -> Self {
        Self {
            provider,
            tokens,
            settings,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.completion_model
    }

    /// Starts a completion for `messages`. Deltas arrive as the provider
    /// produces them, followed by exactly one `Done`.
    pub fn stream(&self, messages: Vec<ChatMessage>) -> mpsc::Receiver<CompletionChunk> {
        let (tx, rx) = mpsc::channel(32);
        let streamer = self.clone();
        tokio::spawn(async move {
            streamer.run(messages, tx).await;
        });
        rx
    }

    async fn run(&self, messages: Vec<ChatMessage>, tx: mpsc::Sender<CompletionChunk>) {
        let started = Instant::now();
        let request = ChatRequest::new(self.settings.completion_model.clone(), messages.clone())
            .with_settings(&self.settings);

        let mut answer = String::new();
        let mut finish_reason: Option<String> = None;

        let streamed: Result<(), ProviderError> = async {
            let mut deltas = self.provider.stream_chat(request).await?;
            while let Some(item) = deltas.recv().await {
                let delta = item?;
                if delta.finish_reason.is_some() {
                    finish_reason = delta.finish_reason;
                }
                let fragment = delta.content.unwrap_or_default();
                answer.push_str(&fragment);
                // Keep draining when nobody listens so usage still covers the full answer.
                let _ = tx.send(CompletionChunk::Delta(fragment)).await;
            }
            Ok::<(), ProviderError>(())
        }
        .await;

        let failure = match &streamed {
            Ok(()) => CompletionFailure::from_finish_reason(finish_reason.as_deref()),
            Err(err) => {
                tracing::error!("Completion request failed: {}", err);
                Some(CompletionFailure::from_provider_error(err))
            }
        };
        if let Some(failure) = failure {
            tracing::error!("{}", failure.code());
        }

        let prompt_tokens = self.tokens.count_tokens(&serialize_messages(&messages)) as u64;
        let completion_tokens = self.tokens.count_tokens(&answer) as u64;

        let outcome = CompletionOutcome {
            text: failure.map(|f| f.display_message()).unwrap_or_default(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            response_time: started.elapsed().as_secs_f64(),
            failure,
        };
        let _ = tx.send(CompletionChunk::Done(outcome)).await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedCompletion;
    use super::*;
    use crate::llm::types::{StreamDelta, ROLE_USER};

    fn streamer(provider: ScriptedCompletion) -> CompletionStreamer {
        CompletionStreamer::new(
            Arc::new(provider),
            TokenCounter::for_model("gpt-3.5-turbo").unwrap(),
            OpenAiSettings::default(),
        )
    }

    async fn collect(streamer: &CompletionStreamer) -> (Vec<String>, Vec<CompletionOutcome>) {
        let mut rx = streamer.stream(vec![ChatMessage::new(ROLE_USER, "What is the refund policy?")]);
        let mut deltas = Vec::new();
        let mut done = Vec::new();
        while let Some(chunk) = rx.recv().await {
            match chunk {
                CompletionChunk::Delta(text) => deltas.push(text),
                CompletionChunk::Done(outcome) => done.push(outcome),
            }
        }
        (deltas, done)
    }

    #[tokio::test]
    async fn clean_stop_reports_usage_once() {
        let s = streamer(ScriptedCompletion::answering(&["Refunds ", "take 14 days."], "stop"));
        let (deltas, done) = collect(&s).await;

        assert_eq!(deltas.concat(), "Refunds take 14 days.");
        assert_eq!(done.len(), 1);
        let outcome = &done[0];
        assert!(!outcome.has_error());
        assert!(outcome.text.is_empty());
        assert!(outcome.usage.prompt_tokens > 0);
        assert!(outcome.usage.completion_tokens > 0);
        assert_eq!(
            outcome.usage.total_tokens,
            outcome.usage.prompt_tokens + outcome.usage.completion_tokens
        );
    }

    #[tokio::test]
    async fn length_finish_overwrites_text_and_flags_error() {
        let s = streamer(ScriptedCompletion::answering(&["partial"], "length"));
        let (_, done) = collect(&s).await;

        assert_eq!(done[0].failure, Some(CompletionFailure::Length));
        assert_eq!(done[0].text, format!(" {}", messages::DISP_MSG_TOKEN_LENGTH));
        assert!(done[0].usage.completion_tokens > 0);
    }

    #[tokio::test]
    async fn content_filter_finish_replaces_text_and_flags_error() {
        let s = streamer(ScriptedCompletion::answering(&["Here is how to "], "content_filter"));
        let (deltas, done) = collect(&s).await;

        assert_eq!(deltas.concat(), "Here is how to ");
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].failure, Some(CompletionFailure::ContentFilter));
        assert!(done[0].has_error());
        assert_eq!(done[0].text, format!(" {}", messages::DISP_MSG_CONTENT_FILTER));
        assert!(done[0].usage.completion_tokens > 0);
    }

    #[tokio::test]
    async fn unknown_finish_reason_is_clean() {
        let s = streamer(ScriptedCompletion::answering(&["ok"], "tool_calls"));
        let (_, done) = collect(&s).await;
        assert_eq!(done[0].failure, None);
        assert!(done[0].text.is_empty());
    }

    #[tokio::test]
    async fn stream_without_finish_reason_is_incomplete() {
        let s = streamer(ScriptedCompletion::scripted(vec![Ok(StreamDelta::content("half"))]));
        let (_, done) = collect(&s).await;
        assert_eq!(done[0].failure, Some(CompletionFailure::Incomplete));
    }

    #[tokio::test]
    async fn provider_failures_become_a_final_record() {
        let s = streamer(ScriptedCompletion::rejecting(ProviderError::RateLimited(
            "slow down".to_string(),
        )));
        let (deltas, done) = collect(&s).await;

        assert!(deltas.is_empty());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].failure, Some(CompletionFailure::RateLimited));
        assert!(done[0].text.starts_with("RateLimitError : "));
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_usage() {
        let s = streamer(ScriptedCompletion::scripted(vec![
            Ok(StreamDelta::content("Refunds")),
            Err(ProviderError::Connection("reset".to_string())),
        ]));
        let (deltas, done) = collect(&s).await;

        assert_eq!(deltas, vec!["Refunds".to_string()]);
        assert_eq!(done[0].failure, Some(CompletionFailure::Connection));
        assert!(done[0].usage.completion_tokens > 0);
    }

    #[test]
    fn every_failure_has_distinct_display_text() {
        let all = [
            CompletionFailure::ProviderApi,
            CompletionFailure::Timeout,
            CompletionFailure::RateLimited,
            CompletionFailure::Connection,
            CompletionFailure::InvalidRequest,
            CompletionFailure::Unexpected,
            CompletionFailure::Length,
            CompletionFailure::ContentFilter,
            CompletionFailure::Incomplete,
        ];
        let texts: std::collections::HashSet<String> =
            all.iter().map(|f| f.display_message()).collect();
        assert_eq!(texts.len(), all.len());
        assert_eq!(CompletionFailure::from_finish_reason(Some("stop")), None);
    }
}
