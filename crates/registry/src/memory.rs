use crate::alias::normalize_alias;
use crate::error::{RegistryError, Result};
use crate::registry::{RegistrySnapshot, SynonymRegistry};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct RegistryState {
    aliases: HashMap<String, String>,
    forms: HashMap<String, BTreeSet<String>>,
    paths: HashMap<String, Vec<String>>,
    labels: HashMap<String, String>,
}

/// Process-local registry guarded by a reader/writer lock.
///
/// Reads share the lock; `insert_if_absent` checks and binds under the write
/// lock, so two first-time resolutions racing on one alias agree on a winner.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let mut state = RegistryState::default();
        for (alias, id) in snapshot.aliases {
            let alias = normalize_alias(&alias);
            if alias.is_empty() {
                continue;
            }
            state
                .forms
                .entry(id.clone())
                .or_default()
                .insert(alias.clone());
            state.aliases.entry(alias).or_insert(id);
        }
        state.paths.extend(snapshot.paths);
        state.labels.extend(snapshot.labels);
        Self {
            state: RwLock::new(state),
        }
    }

    /// Like [`SynonymRegistry::insert_if_absent`], also reporting whether a new
    /// binding was written.
    pub fn bind(&self, alias: &str, concept_id: &str) -> Result<(String, bool)> {
        let key = normalize_alias(alias);
        if key.is_empty() {
            return Err(RegistryError::EmptyAlias(alias.to_string()));
        }

        if let Some(existing) = self.read(|state| state.aliases.get(&key).cloned()) {
            return Ok((existing, false));
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = state.aliases.get(&key) {
            return Ok((existing.clone(), false));
        }
        state.aliases.insert(key.clone(), concept_id.to_string());
        state
            .forms
            .entry(concept_id.to_string())
            .or_default()
            .insert(key);
        Ok((concept_id.to_string(), true))
    }

    /// Like [`SynonymRegistry::bind_all`], also reporting whether any new
    /// binding was written. Lookup and binding happen under one write guard.
    pub fn bind_group(&self, aliases: &[&str], concept_id: &str) -> Result<(String, bool)> {
        let keys: Vec<String> = aliases
            .iter()
            .map(|alias| normalize_alias(alias))
            .filter(|key| !key.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(RegistryError::EmptyAlias(aliases.join(", ")));
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let winner = keys
            .iter()
            .find_map(|key| state.aliases.get(key).cloned())
            .unwrap_or_else(|| concept_id.to_string());

        let mut inserted = false;
        for key in keys {
            if state.aliases.contains_key(&key) {
                continue;
            }
            state.aliases.insert(key.clone(), winner.clone());
            state.forms.entry(winner.clone()).or_default().insert(key);
            inserted = true;
        }
        Ok((winner, inserted))
    }

    /// Records label and path if absent, reporting whether anything changed.
    pub fn record(&self, concept_id: &str, label: &str, path: &[String]) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut changed = false;
        if !path.is_empty() && !state.paths.contains_key(concept_id) {
            state.paths.insert(concept_id.to_string(), path.to_vec());
            changed = true;
        }
        if !label.trim().is_empty() && !state.labels.contains_key(concept_id) {
            state
                .labels
                .insert(concept_id.to_string(), label.to_string());
            changed = true;
        }
        changed
    }

    fn read<T>(&self, f: impl FnOnce(&RegistryState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

impl SynonymRegistry for InMemoryRegistry {
    fn lookup(&self, alias: &str) -> Result<Option<String>> {
        let key = normalize_alias(alias);
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self.read(|state| state.aliases.get(&key).cloned()))
    }

    fn insert_if_absent(&self, alias: &str, concept_id: &str) -> Result<String> {
        self.bind(alias, concept_id).map(|(id, _)| id)
    }

    fn bind_all(&self, aliases: &[&str], concept_id: &str) -> Result<String> {
        self.bind_group(aliases, concept_id).map(|(id, _)| id)
    }

    fn concept_path(&self, concept_id: &str) -> Result<Option<Vec<String>>> {
        Ok(self.read(|state| state.paths.get(concept_id).cloned()))
    }

    fn record_concept(&self, concept_id: &str, label: &str, path: &[String]) -> Result<()> {
        self.record(concept_id, label, path);
        Ok(())
    }

    fn label_of(&self, concept_id: &str) -> Result<Option<String>> {
        Ok(self.read(|state| state.labels.get(concept_id).cloned()))
    }

    fn aliases_of(&self, concept_id: &str) -> Result<Vec<String>> {
        Ok(self.read(|state| {
            state
                .forms
                .get(concept_id)
                .map(|forms| forms.iter().cloned().collect())
                .unwrap_or_default()
        }))
    }

    fn snapshot(&self) -> RegistrySnapshot {
        self.read(|state| RegistrySnapshot {
            aliases: state
                .aliases
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            paths: state
                .paths
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            labels: state
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}
