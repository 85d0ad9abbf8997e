use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Protocol(#[from] concord_protocol::ProtocolError),

    #[error("Candidate retrieval failed: {0}")]
    Retrieval(String),

    #[error("Listing store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Stable machine-readable code for error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Protocol(inner) => inner.code(),
            Self::Retrieval(_) => "retrieval",
            Self::Store(_) => "store",
        }
    }
}
