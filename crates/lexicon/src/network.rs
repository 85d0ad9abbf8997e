use crate::error::{LexiconError, Result};
use crate::sense::{CandidateSense, HypernymRef};
use crate::source::LexicalSource;
use async_trait::async_trait;
use concord_protocol::SourceKind;
use concord_registry::normalize_alias;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_NETWORK: &str = include_str!("../data/network.json");

/// Edges below this weight are treated as noise.
const DEFAULT_MIN_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Synonym,
    FormOf,
    IsA,
    RelatedTo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub start: String,
    pub rel: Relation,
    pub end: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct NetworkFile {
    edges: Vec<Edge>,
}

/// Surface text of a node URI: `/c/en/second_hand` → `second hand`.
#[must_use]
pub fn node_text(uri: &str) -> Option<String> {
    let mut parts = uri.trim_matches('/').split('/');
    if parts.next()? != "c" {
        return None;
    }
    let _language = parts.next()?;
    let term = parts.next()?;
    if term.is_empty() {
        return None;
    }
    Some(term.replace('_', " "))
}

/// Concept-network adapter over a list of weighted, typed edges between
/// `/c/<lang>/<term>` nodes.
///
/// A term's sense is the node itself: synonym and form-of neighbours in either
/// direction become its forms, outgoing is-a edges its hypernyms.
#[derive(Debug)]
pub struct ConceptNetworkSource {
    edges: Vec<Edge>,
    by_term: HashMap<String, Vec<String>>,
    adjacency: HashMap<String, Vec<usize>>,
}

impl ConceptNetworkSource {
    pub fn from_edges(edges: Vec<Edge>, min_weight: f32) -> Result<Self> {
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            if node_text(&edge.start).is_none() || node_text(&edge.end).is_none() {
                return Err(LexiconError::InvalidData(format!(
                    "edge {} -> {} has a malformed node uri",
                    edge.start, edge.end
                )));
            }
            if edge.weight >= min_weight {
                kept.push(edge);
            }
        }

        let mut by_term: HashMap<String, Vec<String>> = HashMap::new();
        let mut adjacency: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, edge) in kept.iter().enumerate() {
            for uri in [&edge.start, &edge.end] {
                adjacency.entry(uri.clone()).or_default().push(idx);
                if let Some(text) = node_text(uri) {
                    let uris = by_term.entry(normalize_alias(&text)).or_default();
                    if !uris.contains(uri) {
                        uris.push(uri.clone());
                    }
                }
            }
        }

        Ok(Self {
            edges: kept,
            by_term,
            adjacency,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: NetworkFile = serde_json::from_str(raw)?;
        Self::from_edges(file.edges, DEFAULT_MIN_WEIGHT)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_NETWORK)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let source = Self::from_json(&raw)?;
        log::info!(
            "Loaded concept network from {:?}: {} edges",
            path.as_ref(),
            source.edges.len()
        );
        Ok(source)
    }

    fn edges_of(&self, uri: &str) -> impl Iterator<Item = &Edge> {
        self.adjacency
            .get(uri)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    fn is_a_chain(&self, uri: &str) -> Vec<HypernymRef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([uri.to_string()]);
        let mut current = uri.to_string();
        loop {
            let parent = self
                .edges_of(&current)
                .filter(|e| e.rel == Relation::IsA && e.start == current)
                .max_by(|a, b| a.weight.total_cmp(&b.weight))
                .map(|e| e.end.clone());
            let Some(parent) = parent else { break };
            if !seen.insert(parent.clone()) {
                break;
            }
            let label = node_text(&parent).unwrap_or_else(|| parent.clone());
            chain.push(HypernymRef::new(&parent, label));
            current = parent;
        }
        chain
    }

    /// Follows outgoing form-of edges to the lemma node:
    /// `/c/en/pre_loved` → `/c/en/preloved`.
    fn lemma_of<'a>(&'a self, uri: &'a str) -> &'a str {
        let mut current = uri;
        let mut seen = HashSet::from([uri]);
        loop {
            let next = self
                .edges_of(current)
                .find(|e| e.rel == Relation::FormOf && e.start == current)
                .map(|e| e.end.as_str());
            match next {
                Some(next) if seen.insert(next) => current = next,
                _ => return current,
            }
        }
    }

    fn sense_for(&self, uri: &str) -> Option<CandidateSense> {
        let label = node_text(uri)?;
        let mut forms = Vec::new();
        let mut related = Vec::new();
        for edge in self.edges_of(uri) {
            let other = if edge.start == uri { &edge.end } else { &edge.start };
            let Some(text) = node_text(other) else { continue };
            match edge.rel {
                Relation::Synonym | Relation::FormOf => forms.push(text),
                Relation::RelatedTo => related.push(text),
                Relation::IsA => {}
            }
        }
        let hypernyms = self.is_a_chain(uri);
        if forms.is_empty() && related.is_empty() && hypernyms.is_empty() {
            return None;
        }

        let mut gloss_words: Vec<&str> = Vec::new();
        gloss_words.extend(forms.iter().map(String::as_str));
        gloss_words.extend(related.iter().map(String::as_str));
        gloss_words.extend(hypernyms.iter().map(|h| h.label.as_str()));

        Some(
            CandidateSense::new(SourceKind::ConceptNetwork, uri, label)
                .gloss(gloss_words.join(", "))
                .forms(forms)
                .hypernyms(hypernyms),
        )
    }
}

#[async_trait]
impl LexicalSource for ConceptNetworkSource {
    fn name(&self) -> &str {
        "concept-network"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ConceptNetwork
    }

    async fn lookup(&self, term: &str) -> Result<Vec<CandidateSense>> {
        let Some(uris) = self.by_term.get(&normalize_alias(term)) else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(uris
            .iter()
            .map(|uri| self.lemma_of(uri))
            .filter(|uri| seen.insert(*uri))
            .filter_map(|uri| self.sense_for(uri))
            .collect())
    }

    async fn hypernyms_of(&self, concept_id: &str) -> Result<Vec<HypernymRef>> {
        Ok(self.is_a_chain(concept_id))
    }
}
