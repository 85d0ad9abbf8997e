use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared alias → concept-id store.
///
/// Implementations must make [`SynonymRegistry::insert_if_absent`] atomic: an
/// alias is bound at most once and keeps that binding for the life of the
/// process. Every method takes raw aliases and normalizes them itself.
pub trait SynonymRegistry: Send + Sync {
    /// Concept id bound to `alias`, if any.
    fn lookup(&self, alias: &str) -> Result<Option<String>>;

    /// Binds `alias` to `concept_id` unless it is already bound, and returns
    /// the id that ends up bound (the existing one when the alias was taken).
    fn insert_if_absent(&self, alias: &str, concept_id: &str) -> Result<String>;

    /// Binds a group of aliases naming one concept in a single atomic step.
    ///
    /// The id of the first alias (in order) that is already bound wins;
    /// otherwise `concept_id` does. Every unbound alias is then bound to the
    /// winner, which is returned. Fails only when no alias has a usable key.
    fn bind_all(&self, aliases: &[&str], concept_id: &str) -> Result<String>;

    /// Hierarchy path recorded for `concept_id`.
    fn concept_path(&self, concept_id: &str) -> Result<Option<Vec<String>>>;

    /// Stores label and path for `concept_id` if none were recorded yet.
    fn record_concept(&self, concept_id: &str, label: &str, path: &[String]) -> Result<()>;

    fn label_of(&self, concept_id: &str) -> Result<Option<String>>;

    /// Normalized aliases currently bound to `concept_id`, sorted.
    fn aliases_of(&self, concept_id: &str) -> Result<Vec<String>>;

    fn snapshot(&self) -> RegistrySnapshot;
}

/// Persisted layout: flat alias map plus side tables keyed by concept id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub aliases: BTreeMap<String, String>,

    #[serde(default)]
    pub paths: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl RegistrySnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    #[must_use]
    pub fn concept_count(&self) -> usize {
        let mut ids: Vec<&String> = self.aliases.values().collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}
