//! # Concord Canon
//!
//! Resolves free-text attribute values to stable concept ids.
//!
//! ```text
//! "Barely-used" ──preprocess──> "used" ──disambiguate──> used.a.01 ──canonicalize──> ConceptNode
//!                                          │                             │
//!                         registry hit? local single sense?       registry insert-if-absent
//!                         fan-out + ensemble + reasoning          (first binding wins)
//! ```
//!
//! Failures of knowledge sources or the registry never surface to callers:
//! the term degrades to a literal concept and matching carries on.

pub mod canonicalize;
pub mod config;
pub mod disambiguate;
pub mod ensemble;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod quantity;
pub mod runtime;

pub use canonicalize::{canonicalize, Canonicalizer, DEFAULT_ROOT};
pub use config::{
    ConcordConfig, DisambiguationConfig, EnsembleWeights, LexiconPaths, MatchingConfig,
    RegistryConfig, CONFIG_ENV,
};
pub use disambiguate::{
    DisambiguatedSense, DisambiguationContext, Disambiguator, DisambiguatorSettings, Resolution,
};
pub use ensemble::{ContextScorer, EmbeddingScorer, Ensemble, PathScorer, ScorerOutput, SenseScorer};
pub use error::{CanonError, Result};
pub use pipeline::{coerce_quantities, Extractor, JsonExtractor, ListingPipeline};
pub use preprocess::{compact_form, is_origin_key, normalize};
pub use quantity::{parse_quantity, Quantity};
pub use runtime::{build_canonicalizer, lazy_reasoner, load_sources, RegistryHandle, Sources};
