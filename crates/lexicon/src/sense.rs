use concord_protocol::{ConceptSource, SourceKind};
use concord_registry::normalize_alias;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reference to a more general concept, in the namespace of the source that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypernymRef {
    pub id: String,
    pub label: String,
}

impl HypernymRef {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One possible meaning of a term, as reported by a single source.
///
/// Produced per disambiguation call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSense {
    pub source: SourceKind,

    /// Identifier in the source's namespace ("dog.n.01", "kg:Q2766", "/c/en/used")
    pub source_id: String,

    pub label: String,

    /// Definition text used for scoring
    pub gloss: String,

    pub all_forms: Vec<String>,

    /// Nearest parent first
    pub hypernyms: Vec<HypernymRef>,

    /// Other sources that reported the same `source_id`
    #[serde(default)]
    pub corroborating: BTreeSet<SourceKind>,

    /// Filled in by the ensemble
    #[serde(default)]
    pub score: f32,
}

impl CandidateSense {
    pub fn new(source: SourceKind, source_id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            source,
            source_id: source_id.into(),
            all_forms: vec![label.clone()],
            label,
            gloss: String::new(),
            hypernyms: Vec::new(),
            corroborating: BTreeSet::new(),
            score: 0.0,
        }
    }

    #[must_use]
    pub fn gloss(mut self, gloss: impl Into<String>) -> Self {
        self.gloss = gloss.into();
        self
    }

    #[must_use]
    pub fn forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for form in forms {
            self.push_form(form.into());
        }
        self
    }

    #[must_use]
    pub fn hypernyms(mut self, hypernyms: Vec<HypernymRef>) -> Self {
        self.hypernyms = hypernyms;
        self
    }

    fn push_form(&mut self, form: String) {
        let key = normalize_alias(&form);
        if key.is_empty() {
            return;
        }
        if !self.all_forms.iter().any(|f| normalize_alias(f) == key) {
            self.all_forms.push(form);
        }
    }

    /// Folds a sense with the same `source_id` from another source into this one.
    pub fn absorb(&mut self, other: Self) {
        if other.source != self.source {
            self.corroborating.insert(other.source);
        }
        self.corroborating.extend(other.corroborating);
        self.corroborating.remove(&self.source);
        for form in other.all_forms {
            self.push_form(form);
        }
        if self.gloss.trim().is_empty() {
            self.gloss = other.gloss;
        }
        if other.hypernyms.len() > self.hypernyms.len() {
            self.hypernyms = other.hypernyms;
        }
    }

    /// Every source that reported this sense.
    #[must_use]
    pub fn concept_source(&self) -> ConceptSource {
        ConceptSource::from_kinds(
            std::iter::once(self.source).chain(self.corroborating.iter().copied()),
        )
    }

    /// Text the scorers compare against the context: label, gloss, forms and
    /// hypernym labels.
    #[must_use]
    pub fn scoring_text(&self) -> String {
        let mut parts: Vec<&str> =
            Vec::with_capacity(2 + self.all_forms.len() + self.hypernyms.len());
        parts.push(&self.label);
        parts.push(&self.gloss);
        parts.extend(self.all_forms.iter().map(String::as_str));
        parts.extend(self.hypernyms.iter().map(|h| h.label.as_str()));
        parts.join(" ")
    }

    /// Short "label: gloss" line shown to the reasoning model.
    #[must_use]
    pub fn definition(&self) -> String {
        if self.gloss.trim().is_empty() {
            self.label.clone()
        } else {
            format!("{}: {}", self.label, self.gloss)
        }
    }
}
