use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexiconError>;

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid lexical data: {0}")]
    InvalidData(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Reasoning model error: {0}")]
    ReasoningError(String),
}
