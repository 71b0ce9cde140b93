use serde::{Deserialize, Serialize};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub n: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            n: None,
        }
    }

    pub fn with_settings(mut self, settings: &crate::core::config::settings::OpenAiSettings) -> Self {
        self.temperature = Some(settings.temperature);
        self.top_p = Some(settings.top_p);
        self.frequency_penalty = Some(settings.frequency_penalty);
        self.presence_penalty = Some(settings.presence_penalty);
        self.n = Some(settings.n);
        self
    }
}

/// One parsed chunk of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl StreamDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            finish_reason: None,
        }
    }

    pub fn finish(reason: impl Into<String>) -> Self {
        Self {
            content: None,
            finish_reason: Some(reason.into()),
        }
    }
}

/// " \n {role} : {content}" per message, the input measured for prompt usage.
pub fn serialize_messages(messages: &[ChatMessage]) -> String {
    messages.iter().fold(String::new(), |acc, message| {
        format!("{} \n {} : {}", acc, message.role, message.content)
    })
}
