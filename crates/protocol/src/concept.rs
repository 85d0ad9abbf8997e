use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Knowledge source that can produce candidate senses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Local lexical hierarchy (synsets, lemmas, hypernyms)
    Lexical,
    /// Multilingual concept network (synonym / is-a edges)
    ConceptNetwork,
    /// Structured knowledge graph (entities, instance-of / subclass-of)
    KnowledgeGraph,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::ConceptNetwork => "concept-network",
            Self::KnowledgeGraph => "knowledge-graph",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a [`ConceptNode`]: `lexical`, `lexical+knowledge-graph`,
/// `registry` or `fallback`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ConceptSource(String);

impl ConceptSource {
    pub const FALLBACK: &'static str = "fallback";
    pub const REGISTRY: &'static str = "registry";

    #[must_use]
    pub fn fallback() -> Self {
        Self(Self::FALLBACK.to_string())
    }

    #[must_use]
    pub fn registry() -> Self {
        Self(Self::REGISTRY.to_string())
    }

    /// Joins the contributing sources in a stable order, e.g. `lexical+knowledge-graph`.
    #[must_use]
    pub fn from_kinds(kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        let kinds: BTreeSet<SourceKind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Self::fallback();
        }
        let joined = kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join("+");
        Self(joined)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.0 == Self::FALLBACK
    }
}

impl fmt::Display for ConceptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical identity of a resolved term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConceptNode {
    /// Stable identifier: a lexical sense id when one exists, otherwise the
    /// lowercased literal. Never changes once registered.
    pub concept_id: String,

    /// Preferred surface form
    pub canonical_label: String,

    /// Every alias known to map to `concept_id`
    #[serde(default)]
    pub all_forms: BTreeSet<String>,

    /// Attribute root, then hypernyms from most general to most specific,
    /// ending with `concept_id`
    #[serde(default)]
    pub concept_path: Vec<String>,

    pub source: ConceptSource,
}

impl ConceptNode {
    /// Literal node for a term no knowledge source could resolve.
    #[must_use]
    pub fn fallback(term: &str) -> Self {
        let literal = term.trim().to_lowercase();
        let mut all_forms = BTreeSet::new();
        all_forms.insert(literal.clone());
        Self {
            concept_id: literal.clone(),
            canonical_label: literal.clone(),
            all_forms,
            concept_path: vec![literal],
            source: ConceptSource::fallback(),
        }
    }

    /// True when `concept_id` appears strictly above this node in its path.
    #[must_use]
    pub fn has_ancestor(&self, concept_id: &str) -> bool {
        match self.concept_path.split_last() {
            Some((_, ancestors)) => ancestors.iter().any(|id| id == concept_id),
            None => false,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source.is_fallback()
    }
}

/// Attribute value as it travels through the system: the raw extracted text,
/// or that text with the concept the canonicalizer attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Term {
    Raw(String),
    Resolved { text: String, concept: ConceptNode },
}

impl Term {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Raw(text) | Self::Resolved { text, .. } => text,
        }
    }

    #[must_use]
    pub fn concept(&self) -> Option<&ConceptNode> {
        match self {
            Self::Raw(_) => None,
            Self::Resolved { concept, .. } => Some(concept),
        }
    }

    #[must_use]
    pub fn with_concept(self, concept: ConceptNode) -> Self {
        let text = match self {
            Self::Raw(text) | Self::Resolved { text, .. } => text,
        };
        Self::Resolved { text, concept }
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_joins_kinds_in_stable_order() {
        let source =
            ConceptSource::from_kinds([SourceKind::KnowledgeGraph, SourceKind::Lexical]);
        assert_eq!(source.as_str(), "lexical+knowledge-graph");
        assert!(ConceptSource::from_kinds([]).is_fallback());
    }

    #[test]
    fn ancestor_check_excludes_self() {
        let node = ConceptNode {
            concept_id: "puppy.n.01".to_string(),
            canonical_label: "puppy".to_string(),
            all_forms: BTreeSet::new(),
            concept_path: vec![
                "type".to_string(),
                "animal.n.01".to_string(),
                "dog.n.01".to_string(),
                "puppy.n.01".to_string(),
            ],
            source: ConceptSource::from_kinds([SourceKind::Lexical]),
        };
        assert!(node.has_ancestor("dog.n.01"));
        assert!(!node.has_ancestor("puppy.n.01"));
        assert!(!node.has_ancestor("cat.n.01"));
    }

    #[test]
    fn term_accepts_bare_strings_and_resolved_objects() {
        let raw: Term = serde_json::from_str("\"Second Hand\"").unwrap();
        assert_eq!(raw, Term::Raw("Second Hand".to_string()));

        let node = ConceptNode::fallback("Second Hand");
        let resolved = raw.clone().with_concept(node.clone());
        let json = serde_json::to_string(&resolved).unwrap();
        let back: Term = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text(), "Second Hand");
        assert_eq!(back.concept(), Some(&node));
    }
}
