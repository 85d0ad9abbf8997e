use thiserror::Error;

pub type Result<T> = std::result::Result<T, CanonError>;

#[derive(Error, Debug)]
pub enum CanonError {
    #[error(transparent)]
    Protocol(#[from] concord_protocol::ProtocolError),

    #[error("Registry error: {0}")]
    Registry(#[from] concord_registry::RegistryError),

    #[error("Lexicon error: {0}")]
    Lexicon(#[from] concord_lexicon::LexiconError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CanonError {
    /// Stable machine-readable code for error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Protocol(inner) => inner.code(),
            Self::Registry(_) => "registry",
            Self::Lexicon(_) => "lexicon",
            Self::IoError(_) => "io",
            Self::Extraction(_) => "extraction",
            Self::Config(_) => "config",
        }
    }
}
