use crate::error::{LexiconError, Result};
use crate::sense::{CandidateSense, HypernymRef};
use crate::source::LexicalSource;
use async_trait::async_trait;
use concord_protocol::SourceKind;
use concord_registry::normalize_alias;
use petgraph::algo::{dijkstra, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_LEXICON: &str = include_str!("../data/lexicon.json");

/// One sense in the lexical hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synset {
    pub id: String,
    pub lemmas: Vec<String>,
    #[serde(default)]
    pub gloss: String,
    /// Direct parents; the first one is the primary chain used for paths
    #[serde(default)]
    pub hypernyms: Vec<String>,
}

impl Synset {
    #[must_use]
    pub fn label(&self) -> &str {
        self.lemmas.first().map_or(self.id.as_str(), String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    synsets: Vec<Synset>,
}

/// Synsets linked child → parent by hypernym edges.
#[derive(Debug)]
pub struct LexicalHierarchy {
    graph: DiGraph<Synset, ()>,
    by_id: HashMap<String, NodeIndex>,
    by_lemma: HashMap<String, Vec<NodeIndex>>,
}

impl LexicalHierarchy {
    pub fn from_synsets(synsets: Vec<Synset>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut by_id = HashMap::new();
        let mut by_lemma: HashMap<String, Vec<NodeIndex>> = HashMap::new();

        for synset in synsets {
            if synset.lemmas.is_empty() {
                return Err(LexiconError::InvalidData(format!(
                    "synset '{}' has no lemmas",
                    synset.id
                )));
            }
            if by_id.contains_key(&synset.id) {
                return Err(LexiconError::InvalidData(format!(
                    "duplicate synset id '{}'",
                    synset.id
                )));
            }
            let id = synset.id.clone();
            let keys: Vec<String> = synset.lemmas.iter().map(|l| normalize_alias(l)).collect();
            let idx = graph.add_node(synset);
            by_id.insert(id, idx);
            for key in keys {
                let entry = by_lemma.entry(key).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
        }

        let edges: Vec<(NodeIndex, String)> = graph
            .node_indices()
            .flat_map(|idx| {
                graph[idx]
                    .hypernyms
                    .iter()
                    .map(move |parent| (idx, parent.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (child, parent) in edges {
            let Some(&parent_idx) = by_id.get(&parent) else {
                return Err(LexiconError::InvalidData(format!(
                    "synset '{}' names unknown hypernym '{parent}'",
                    graph[child].id
                )));
            };
            graph.add_edge(child, parent_idx, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(LexiconError::InvalidData(
                "hypernym edges form a cycle".to_string(),
            ));
        }

        Ok(Self {
            graph,
            by_id,
            by_lemma,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: LexiconFile = serde_json::from_str(raw)?;
        Self::from_synsets(file.synsets)
    }

    /// Seed hierarchy compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LEXICON)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let hierarchy = Self::from_json(&raw)?;
        log::info!(
            "Loaded lexical hierarchy from {:?}: {} synsets",
            path.as_ref(),
            hierarchy.len()
        );
        Ok(hierarchy)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    #[must_use]
    pub fn synset(&self, id: &str) -> Option<&Synset> {
        self.by_id.get(id).map(|&idx| &self.graph[idx])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Synsets having `term` among their lemmas (compound spellings fold).
    #[must_use]
    pub fn senses(&self, term: &str) -> Vec<&Synset> {
        self.by_lemma
            .get(&normalize_alias(term))
            .map(|nodes| nodes.iter().map(|&idx| &self.graph[idx]).collect())
            .unwrap_or_default()
    }

    /// Primary hypernym chain above `id`, nearest parent first.
    #[must_use]
    pub fn hypernym_chain(&self, id: &str) -> Vec<HypernymRef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.synset(id);
        while let Some(synset) = current {
            if !seen.insert(synset.id.as_str()) {
                break;
            }
            let parent = synset.hypernyms.first().and_then(|p| self.synset(p));
            if let Some(parent) = parent {
                chain.push(HypernymRef::new(&parent.id, parent.label()));
            }
            current = parent;
        }
        chain
    }

    /// Hops from `id` to each of its ancestors (itself at 0).
    fn ancestor_distances(&self, id: &str) -> Option<HashMap<NodeIndex, u32>> {
        let start = *self.by_id.get(id)?;
        Some(dijkstra(&self.graph, start, None, |_| 1u32))
    }

    /// WordNet-style path similarity `1 / (1 + d)` where `d` is the shortest
    /// route between the two synsets through a common ancestor. `None` when
    /// either id is unknown or they share no ancestor.
    #[must_use]
    pub fn path_similarity(&self, a: &str, b: &str) -> Option<f32> {
        let da = self.ancestor_distances(a)?;
        let db = self.ancestor_distances(b)?;
        let best = da
            .iter()
            .filter_map(|(node, dist_a)| db.get(node).map(|dist_b| dist_a + dist_b))
            .min()?;
        Some(1.0 / (1.0 + best as f32))
    }

    #[must_use]
    pub fn candidate(&self, synset: &Synset) -> CandidateSense {
        CandidateSense::new(SourceKind::Lexical, &synset.id, synset.label())
            .gloss(&synset.gloss)
            .forms(synset.lemmas.iter().cloned())
            .hypernyms(self.hypernym_chain(&synset.id))
    }
}

/// [`LexicalSource`] over an in-memory [`LexicalHierarchy`].
#[derive(Debug, Clone)]
pub struct HierarchySource {
    hierarchy: Arc<LexicalHierarchy>,
}

impl HierarchySource {
    pub fn new(hierarchy: Arc<LexicalHierarchy>) -> Self {
        Self { hierarchy }
    }

    #[must_use]
    pub fn hierarchy(&self) -> &Arc<LexicalHierarchy> {
        &self.hierarchy
    }
}

#[async_trait]
impl LexicalSource for HierarchySource {
    fn name(&self) -> &str {
        "lexical"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Lexical
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn lookup(&self, term: &str) -> Result<Vec<CandidateSense>> {
        Ok(self
            .hierarchy
            .senses(term)
            .into_iter()
            .map(|synset| self.hierarchy.candidate(synset))
            .collect())
    }

    async fn hypernyms_of(&self, concept_id: &str) -> Result<Vec<HypernymRef>> {
        Ok(self.hierarchy.hypernym_chain(concept_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builtin() -> LexicalHierarchy {
        LexicalHierarchy::builtin().unwrap()
    }

    #[test]
    fn builtin_seed_is_valid() {
        assert!(builtin().len() > 40);
    }

    #[test]
    fn puppy_chain_reaches_dog() {
        let h = builtin();
        let chain: Vec<String> = h
            .hypernym_chain("puppy.n.01")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(chain.first().map(String::as_str), Some("dog.n.01"));
        assert!(chain.contains(&"animal.n.01".to_string()));
        assert!(h
            .hypernym_chain("dog.n.01")
            .iter()
            .all(|r| r.id != "puppy.n.01"));
    }

    #[test]
    fn ambiguous_lemma_lists_every_sense() {
        let h = builtin();
        let ids: Vec<&str> = h.senses("notebook").iter().map(|s| s.id.as_str()).collect();
        assert!(ids.contains(&"laptop.n.01"));
        assert!(ids.contains(&"notebook.n.01"));
    }

    #[test]
    fn compound_spellings_find_the_same_sense() {
        let h = builtin();
        assert_eq!(h.senses("second hand").len(), 1);
        assert_eq!(h.senses("second-hand")[0].id, "used.a.01");
    }

    #[test]
    fn path_similarity_prefers_close_relatives() {
        let h = builtin();
        let siblings = h.path_similarity("dentist.n.01", "surgeon.n.01").unwrap();
        let distant = h.path_similarity("dentist.n.01", "car.n.01").unwrap();
        assert!(siblings > distant);
        assert_eq!(h.path_similarity("dog.n.01", "dog.n.01"), Some(1.0));
        assert_eq!(h.path_similarity("dog.n.01", "missing.n.01"), None);
    }

    #[test]
    fn unknown_hypernym_is_rejected() {
        let err = LexicalHierarchy::from_synsets(vec![Synset {
            id: "a.n.01".to_string(),
            lemmas: vec!["a".to_string()],
            gloss: String::new(),
            hypernyms: vec!["b.n.01".to_string()],
        }])
        .unwrap_err();
        assert!(matches!(err, LexiconError::InvalidData(_)));
    }

    #[test]
    fn cycles_are_rejected() {
        let synset = |id: &str, parent: &str| Synset {
            id: id.to_string(),
            lemmas: vec![id.to_string()],
            gloss: String::new(),
            hypernyms: vec![parent.to_string()],
        };
        let err =
            LexicalHierarchy::from_synsets(vec![synset("a", "b"), synset("b", "a")]).unwrap_err();
        assert!(matches!(err, LexiconError::InvalidData(_)));
    }

    #[tokio::test]
    async fn source_reports_lexical_candidates() {
        let source = HierarchySource::new(Arc::new(builtin()));
        let senses = source.lookup("Dentist").await.unwrap();
        assert_eq!(senses.len(), 1);
        assert_eq!(senses[0].source, SourceKind::Lexical);
        assert_eq!(senses[0].hypernyms[0].id, "doctor.n.01");
    }
}
