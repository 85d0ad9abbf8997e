use crate::canonicalize::Canonicalizer;
use crate::error::{CanonError, Result};
use crate::quantity::parse_quantity;
use async_trait::async_trait;
use concord_protocol::{Listing, NumericValue, RawListing};
use serde_json::Value;
use std::sync::Arc;

const BOUND_FIELDS: [&str; 3] = ["min", "max", "range"];

/// Turns a free-text query into a structured listing draft.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<RawListing>;
}

/// Extractor for callers that already send the draft as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

#[async_trait]
impl Extractor for JsonExtractor {
    async fn extract(&self, query: &str) -> Result<RawListing> {
        serde_json::from_str(query)
            .map(RawListing)
            .map_err(|err| CanonError::Extraction(format!("draft is not JSON: {err}")))
    }
}

/// Query in, canonicalized listing out.
pub struct ListingPipeline {
    extractor: Arc<dyn Extractor>,
    canonicalizer: Arc<Canonicalizer>,
}

impl ListingPipeline {
    pub fn new(extractor: Arc<dyn Extractor>, canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            extractor,
            canonicalizer,
        }
    }

    #[must_use]
    pub fn canonicalizer(&self) -> &Arc<Canonicalizer> {
        &self.canonicalizer
    }

    /// Extracts, validates and canonicalizes. Extraction failures come back as
    /// [`CanonError::Extraction`]; drafts breaking the listing contract as
    /// [`CanonError::Protocol`].
    pub async fn ingest(&self, query: &str) -> Result<Listing> {
        let raw = self.extractor.extract(query).await.map_err(|err| match err {
            CanonError::Extraction(_) => err,
            other => CanonError::Extraction(other.to_string()),
        })?;
        self.prepare(raw).await
    }

    /// Same as [`Self::ingest`] for a draft that is already extracted.
    pub async fn prepare(&self, mut raw: RawListing) -> Result<Listing> {
        coerce_quantities(&mut raw.0);
        let mut listing = Listing::from_raw(raw)?;
        self.canonicalizer.canonicalize_listing(&mut listing).await;
        Ok(listing)
    }
}

/// Rewrites constraint values written as phrases ("around 60k") into numbers,
/// filling `unit` and `approximate` when the draft left them out. Values that
/// do not parse are left for validation to reject.
pub fn coerce_quantities(draft: &mut Value) {
    match draft {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if BOUND_FIELDS.contains(&key.as_str()) {
                    coerce_bounds(value);
                } else {
                    coerce_quantities(value);
                }
            }
        }
        Value::Array(values) => values.iter_mut().for_each(coerce_quantities),
        _ => {}
    }
}

fn coerce_bounds(bounds: &mut Value) {
    let Value::Object(axes) = bounds else {
        return;
    };
    for constraints in axes.values_mut() {
        let Value::Array(constraints) = constraints else {
            continue;
        };
        for constraint in constraints {
            let Value::Object(fields) = constraint else {
                continue;
            };
            let Some(quantity) = fields
                .get("value")
                .and_then(Value::as_str)
                .and_then(parse_quantity)
            else {
                continue;
            };

            let value = match quantity.value {
                NumericValue::Scalar(v) => Value::from(v),
                NumericValue::Pair([lo, hi]) => Value::from(vec![lo, hi]),
            };
            fields.insert("value".to_string(), value);
            if let Some(unit) = quantity.unit {
                fields.entry("unit").or_insert(Value::String(unit));
            }
            if quantity.approximate {
                fields.insert("approximate".to_string(), Value::Bool(true));
            }
        }
    }
}
