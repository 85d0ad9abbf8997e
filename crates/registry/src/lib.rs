//! # Concord Registry
//!
//! The synonym registry is the single source of truth for "is this the same
//! concept": every normalized alias maps to at most one concept id, and a
//! binding never changes once written.
//!
//! ```text
//! "Second-Hand" ──normalize_alias──> "secondhand" ──> "used.a.01"
//!                                                        │
//!                                      paths["used.a.01"] = [condition, ..., used.a.01]
//! ```
//!
//! [`InMemoryRegistry`] serves tests and single-process use;
//! [`PersistentRegistry`] adds write-behind JSON persistence.

mod alias;
mod error;
mod memory;
mod persist;
mod registry;

pub use alias::normalize_alias;
pub use error::{RegistryError, Result};
pub use memory::InMemoryRegistry;
pub use persist::{read_snapshot, write_snapshot, PersistentRegistry};
pub use registry::{RegistrySnapshot, SynonymRegistry};
