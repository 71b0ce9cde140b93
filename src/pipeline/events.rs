use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Answer,
}

/// One JSON object of the query event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryEvent {
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryEvent {
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Processing,
            message: Some(message.into()),
            error: None,
        }
    }

    /// An answer fragment, or the error text that ends a failed query.
    pub fn answer(message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Answer,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Rejected input.
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Answer,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
