//! # Concord Protocol
//!
//! Wire and in-memory data model shared by the canonicalization and matching
//! crates: listings, items, numeric constraint axes and resolved concepts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod concept;
mod error;
mod listing;
mod numeric;

pub use concept::{ConceptNode, ConceptSource, SourceKind, Term};
pub use error::{ProtocolError, Result};
pub use listing::{
    AttributeBag, Intent, Item, Listing, ListingId, Location, LocationMode, RawListing, Subintent,
};
pub use numeric::{
    Axis, AxisConstraints, BoundedAttribute, Constraint, ConstraintKey, Interval,
    NumericConstraints, NumericValue,
};

/// Error body returned to callers whose request was rejected.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&ProtocolError> for ErrorEnvelope {
    fn from(err: &ProtocolError) -> Self {
        let hint = match err {
            ProtocolError::MalformedListing { field, .. } => {
                Some(format!("fix the '{field}' field of the listing and retry"))
            }
            ProtocolError::SerializationError(_) => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            hint,
        }
    }
}
