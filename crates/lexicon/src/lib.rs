//! # Concord Lexicon
//!
//! Knowledge sources the disambiguator draws candidate senses from, plus the
//! model providers its ensemble scores them with.
//!
//! ## Sources
//!
//! - [`HierarchySource`]: local synset hierarchy stored as a petgraph `DiGraph`
//!   (child → parent hypernym edges). It is the only local source and drives
//!   the single-sense short-circuit.
//! - [`ConceptNetworkSource`]: typed, weighted edges between `/c/<lang>/<term>`
//!   nodes (synonyms, forms, is-a).
//! - [`KnowledgeGraphSource`]: entities with instance-of / subclass-of chains;
//!   entities linked to a synset report the synset id so both sources agree.
//!
//! Each source ships with an embedded seed and can load a JSON dump instead.
//!
//! ## Models
//!
//! - [`Embedder`] with the offline [`HashingEmbedder`] and an LRU
//!   [`CachedEmbedder`] wrapper.
//! - [`ReasoningModel`] behind a [`LazyReasoner`] handle that loads on first
//!   escalation.

pub mod embed;
pub mod error;
pub mod hierarchy;
pub mod knowledge;
pub mod network;
pub mod reason;
pub mod sense;
pub mod source;
pub mod text;

pub use embed::{cosine_similarity, CachedEmbedder, Embedder, HashingEmbedder};
pub use error::{LexiconError, Result};
pub use hierarchy::{HierarchySource, LexicalHierarchy, Synset};
pub use knowledge::{Entity, KnowledgeGraphSource};
pub use network::{ConceptNetworkSource, Edge, Relation};
pub use reason::{parse_choice, GlossOverlapReasoner, LazyReasoner, ReasoningModel};
pub use sense::{CandidateSense, HypernymRef};
pub use source::LexicalSource;
pub use text::{content_tokens, shares_stem};
