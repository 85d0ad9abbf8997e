//! # Concord Engine
//!
//! Decides whether one canonicalized listing satisfies another.
//!
//! ```text
//! requester, candidate
//!   │
//!   ├─ intent ─ subintent ─ domain/category      (structural)
//!   ├─ items                                      SemanticImplies + numeric intervals
//!   ├─ preferences                                both directions for mutual intent
//!   └─ location
//! ```
//!
//! Gates short-circuit: the first failure ends the evaluation and is
//! reported in the [`MatchReport`]. Matching never fails; registry trouble
//! narrows implication to plain text equality.

pub mod engine;
pub mod error;
pub mod implies;
pub mod numeric;
pub mod service;

pub use engine::{Gate, MatchReport, MatchingEngine};
pub use error::{EngineError, Result};
pub use implies::{in_synonym_set, SemanticImplies};
pub use numeric::{first_unmet, fold_unit, units_compatible};
pub use service::{CandidateRetriever, InMemoryListingStore, ListingStore, MatchService};
