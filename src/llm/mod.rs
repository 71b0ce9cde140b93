pub mod openai;
pub mod provider;
pub mod streamer;
pub mod tokens;
pub mod types;

pub use openai::OpenAiClient;
pub use provider::{CompletionProvider, EmbeddingProvider, ProviderError};
pub use streamer::{CompletionChunk, CompletionFailure, CompletionOutcome, CompletionStreamer};
pub use tokens::{TokenCounter, UnitPricing};
pub use types::{ChatMessage, ChatRequest, StreamDelta};
