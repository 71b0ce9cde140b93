use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to open database: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Failed to initialize tokenizer: {0}")]
    Tokenizer(#[source] anyhow::Error),
}
