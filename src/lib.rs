use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Provider '{0}' is not available; check that its API key is set")]
    ProviderNotAvailable(String),

    #[error("No LLM providers configured; set GEMINI_API_KEY or OPENAI_API_KEY")]
    NoProvidersConfigured,

    #[error("All LLM providers failed; last error from '{provider}': {message}")]
    AllProvidersFailed { provider: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod llm;
pub mod server;
pub mod split;
pub mod store;
