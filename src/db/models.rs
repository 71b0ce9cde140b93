use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    /// Owner email.
    pub user: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    User,
    Assistant,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub message_type: String,
    pub content: String,
    pub created_at: String,
}

/// Usage telemetry for one query turn, attached to the user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageLog {
    pub message_id: i64,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub response_time: f64,
    pub has_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageLog {
    pub id: i64,
    pub message_id: i64,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub response_time: f64,
    pub has_error: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: i64,
    pub chat_id: i64,
    pub content: String,
    pub rating: i64,
    pub created_at: String,
}

/// A knowledge-base row as uploaded, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewKnowledgeRow {
    pub keywords: String,
    pub title: String,
    pub source: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct KnowledgeRow {
    pub id: i64,
    pub keywords: String,
    pub title: String,
    pub source: String,
    pub content: String,
    pub category: String,
    pub is_embedded: bool,
}
