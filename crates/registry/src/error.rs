use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Registry file {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Alias normalizes to an empty key: '{0}'")]
    EmptyAlias(String),

    #[error("Registry backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}
