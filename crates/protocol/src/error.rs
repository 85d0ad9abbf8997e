use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An input listing violates the structural contract. This is the only
    /// error class that reaches the end user as a rejected request.
    #[error("Malformed listing: {field}: {reason}")]
    MalformedListing { field: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedListing {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedListing { .. } => "malformed_listing",
            Self::SerializationError(_) => "serialization",
        }
    }
}
