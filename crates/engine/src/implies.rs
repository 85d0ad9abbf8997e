//! `SemanticImplies(candidate, required)`: does an offered value satisfy a
//! requested one?
//!
//! Checks run cheapest first and the first hit wins:
//!
//! 1. same text (case and whitespace folded) or same attached concept
//! 2. same registry concept id
//! 3. the candidate's concept path runs through the required concept
//! 4. both values sit in one curated synonym set
//! 5. shared prefix of at least `min_prefix` characters
//!
//! Step 3 only looks up the candidate's ancestors, so "puppy" implies "dog"
//! but "dog" does not imply "puppy".

use concord_canon::compact_form;
use concord_lexicon::shares_stem;
use concord_protocol::Term;
use concord_registry::SynonymRegistry;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Small closed-class vocabularies the lexical sources do not cover well.
const SYNONYM_SETS: &[&[&str]] = &[
    &["female", "woman", "women", "f", "girl", "lady"],
    &["male", "man", "men", "m", "boy", "gentleman"],
    &["yes", "y", "true"],
    &["no", "n", "false", "none"],
    &["tv", "television", "television set"],
    &["vegetarian", "veg", "veggie"],
    &["non vegetarian", "non-veg", "nonveg"],
    &["flat", "apartment"],
    &["any", "either", "no preference"],
    &["fridge", "refrigerator"],
    &["ac", "air conditioner", "air conditioning"],
];

static SYNONYM_INDEX: Lazy<HashMap<String, Vec<usize>>> = Lazy::new(|| {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (set, members) in SYNONYM_SETS.iter().enumerate() {
        for member in *members {
            index.entry(compact_form(member)).or_default().push(set);
        }
    }
    index
});

fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when both values appear in one curated synonym set.
#[must_use]
pub fn in_synonym_set(a: &str, b: &str) -> bool {
    let (Some(left), Some(right)) = (
        SYNONYM_INDEX.get(&compact_form(a)),
        SYNONYM_INDEX.get(&compact_form(b)),
    ) else {
        return false;
    };
    left.iter().any(|set| right.contains(set))
}

/// Registry-backed implication check shared by every matching gate.
#[derive(Clone)]
pub struct SemanticImplies {
    registry: Arc<dyn SynonymRegistry>,
    min_prefix: usize,
}

impl SemanticImplies {
    pub fn new(registry: Arc<dyn SynonymRegistry>, min_prefix: usize) -> Self {
        Self {
            registry,
            min_prefix,
        }
    }

    /// Whether `candidate` satisfies `required`. Never fails: a registry error
    /// leaves only the plain text comparison.
    #[must_use]
    pub fn implies(&self, candidate: &Term, required: &Term) -> bool {
        let (cand_text, req_text) = (fold(candidate.text()), fold(required.text()));
        if cand_text.is_empty() || req_text.is_empty() {
            return false;
        }
        if cand_text == req_text {
            return true;
        }
        if let (Some(c), Some(r)) = (candidate.concept(), required.concept()) {
            if c.concept_id == r.concept_id {
                return true;
            }
        }

        match self.ontological(candidate, &cand_text, required, &req_text) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                log::warn!(
                    "Registry unavailable while matching '{cand_text}' against '{req_text}': {err}"
                );
                return false;
            }
        }

        if in_synonym_set(&cand_text, &req_text) {
            return true;
        }
        shares_stem(
            &compact_form(&cand_text),
            &compact_form(&req_text),
            self.min_prefix,
        )
    }

    /// Text-only convenience over [`Self::implies`].
    #[must_use]
    pub fn implies_text(&self, candidate: &str, required: &str) -> bool {
        self.implies(&Term::from(candidate), &Term::from(required))
    }

    /// Registry id equality, then the candidate's ancestors.
    fn ontological(
        &self,
        candidate: &Term,
        cand_text: &str,
        required: &Term,
        req_text: &str,
    ) -> concord_registry::Result<bool> {
        let cand_id = match candidate.concept() {
            Some(node) => Some(node.concept_id.clone()),
            None => self.registry.lookup(cand_text)?,
        };
        let req_id = match required.concept() {
            Some(node) => Some(node.concept_id.clone()),
            None => self.registry.lookup(req_text)?,
        };
        let Some(cand_id) = cand_id else {
            return Ok(false);
        };
        if req_id.as_deref() == Some(cand_id.as_str()) {
            return Ok(true);
        }

        let path = match candidate.concept() {
            Some(node) if !node.concept_path.is_empty() => node.concept_path.clone(),
            _ => self.registry.concept_path(&cand_id)?.unwrap_or_default(),
        };
        let Some((_, ancestors)) = path.split_last() else {
            return Ok(false);
        };

        let req_key = compact_form(req_text);
        for ancestor in ancestors {
            if req_id.as_deref() == Some(ancestor.as_str()) {
                return Ok(true);
            }
            // Ancestors from another source's namespace match through their label.
            if let Some(label) = self.registry.label_of(ancestor)? {
                if compact_form(&label) == req_key {
                    return Ok(true);
                }
                if req_id.is_some() && self.registry.lookup(&label)? == req_id {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
