//! Error types for regqa.

use thiserror::Error;

/// Library-level error type for regqa operations.
#[derive(Error, Debug)]
pub enum RegQaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document loading failed: {0}")]
    DocumentLoad(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Index is not built or loaded; build or load it first")]
    IndexUnavailable,

    #[error("Persisted index state is corrupt: {0}")]
    CorruptPersistedState(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for regqa operations.
pub type Result<T> = std::result::Result<T, RegQaError>;
