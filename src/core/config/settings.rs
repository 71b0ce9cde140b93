use serde::{Deserialize, Serialize};

/// Typed application settings. Every field has a default so a partial
/// `config.yml` (or none at all) is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub openai: OpenAiSettings,
    pub retrieval: RetrievalSettings,
    pub oauth: OAuthSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://ragchat.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub completion_model: String,
    pub embedding_model: String,
    /// Model whose tokenizer is used for counting and chunking.
    pub tokenizer_model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub n: u32,
    pub input_unit_cost: f64,
    pub output_unit_cost: f64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            completion_model: "gpt-4-0125-preview".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            tokenizer_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
            input_unit_cost: 0.00001,
            output_unit_cost: 0.00003,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 32,
            chunk_size: 256,
            chunk_overlap: 32,
            batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub frontend_url: String,
    pub error_url: String,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: "https://nulab-exam.backlog.jp/OAuth2AccessRequest.action".to_string(),
            token_url: "https://nulab-exam.backlog.jp/api/v2/oauth2/token".to_string(),
            profile_url: "https://nulab-exam.backlog.jp/api/v2/users/myself".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            error_url: "http://localhost:3000/oauth_error".to_string(),
        }
    }
}
