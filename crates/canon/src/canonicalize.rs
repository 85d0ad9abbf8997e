use crate::disambiguate::{DisambiguatedSense, DisambiguationContext, Disambiguator};
use crate::preprocess::{compact_form, normalize};
use concord_protocol::{AttributeBag, ConceptNode, ConceptSource, Listing, Term};
use concord_registry::SynonymRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Path root used when a term is resolved without an attribute key.
pub const DEFAULT_ROOT: &str = "attribute";

const TYPE_KEY: &str = "type";
const EXCLUSION_KEY: &str = "exclusion";

fn attribute_root(attribute_key: &str) -> String {
    let root = attribute_key.trim().to_lowercase().replace([' ', '-'], "_");
    if root.is_empty() {
        DEFAULT_ROOT.to_string()
    } else {
        root
    }
}

/// Turns a disambiguated sense into a registered [`ConceptNode`].
///
/// Aliases already bound in the registry win over the sense's own id, which
/// is how a term found through one source converges with the same concept
/// found earlier through another. Never fails: registry errors are logged
/// and the node is still returned.
pub fn canonicalize(
    sense: Option<&DisambiguatedSense>,
    original_term: &str,
    attribute_key: &str,
    registry: &dyn SynonymRegistry,
) -> ConceptNode {
    let root = attribute_root(attribute_key);
    match sense {
        Some(sense) if !sense.is_fallback() => resolved(sense, original_term, &root, registry),
        _ => literal(original_term, &root, registry),
    }
}

fn literal(original_term: &str, root: &str, registry: &dyn SynonymRegistry) -> ConceptNode {
    let mut node = ConceptNode::fallback(original_term);
    if node.concept_id.is_empty() {
        return node;
    }
    log::info!("Coverage gap: '{}' resolved to a literal concept", node.concept_id);

    match registry.insert_if_absent(original_term, &node.concept_id) {
        Ok(id) if id != node.concept_id => {
            node.concept_id = id;
            node.source = ConceptSource::registry();
        }
        Ok(_) => {}
        Err(err) => {
            log::warn!("Registry unavailable while registering '{original_term}': {err}");
            node.concept_path = vec![root.to_string(), node.concept_id.clone()];
            return node;
        }
    }
    let path = vec![root.to_string(), node.concept_id.clone()];
    finish(node, &path, registry)
}

fn resolved(
    sense: &DisambiguatedSense,
    original_term: &str,
    root: &str,
    registry: &dyn SynonymRegistry,
) -> ConceptNode {
    let mut aliases: Vec<&str> = Vec::with_capacity(sense.all_forms.len() + 2);
    let mut seen = BTreeSet::new();
    for alias in std::iter::once(original_term)
        .chain(std::iter::once(sense.label.as_str()))
        .chain(sense.all_forms.iter().map(String::as_str))
    {
        let key = compact_form(alias);
        if !key.is_empty() && seen.insert(key) {
            aliases.push(alias);
        }
    }

    // One atomic step: an alias already bound elsewhere decides the id for
    // the whole group, otherwise the sense's own id is adopted.
    let bound = if aliases.is_empty() {
        Ok(sense.concept_id.clone())
    } else {
        registry.bind_all(&aliases, &sense.concept_id)
    };
    let (concept_id, registry_ok) = match bound {
        Ok(winner) => (winner, true),
        Err(err) => {
            log::warn!("Registry unavailable while registering '{original_term}': {err}");
            (sense.concept_id.clone(), false)
        }
    };
    if registry_ok {
        for hypernym in &sense.hypernyms {
            if let Err(err) = registry.record_concept(&hypernym.id, &hypernym.label, &[]) {
                log::debug!("Could not record hypernym {}: {err}", hypernym.id);
            }
        }
    }

    let mut path = Vec::with_capacity(sense.hypernyms.len() + 2);
    path.push(root.to_string());
    path.extend(sense.hypernyms.iter().rev().map(|h| h.id.clone()));
    path.push(concept_id.clone());

    let node = ConceptNode {
        concept_id,
        canonical_label: sense.label.clone(),
        all_forms: aliases.iter().map(|a| compact_form(a)).collect(),
        concept_path: path.clone(),
        source: sense.source.clone(),
    };
    if registry_ok {
        finish(node, &path, registry)
    } else {
        node
    }
}

/// Records label and path, then reads back what the registry holds so every
/// resolution of one concept returns the same node.
fn finish(mut node: ConceptNode, path: &[String], registry: &dyn SynonymRegistry) -> ConceptNode {
    let id = node.concept_id.clone();
    if let Err(err) = registry.record_concept(&id, &node.canonical_label, path) {
        log::debug!("Could not record concept {id}: {err}");
        return node;
    }
    if let Ok(Some(stored)) = registry.concept_path(&id) {
        node.concept_path = stored;
    }
    if let Ok(Some(label)) = registry.label_of(&id) {
        node.canonical_label = label;
    }
    if let Ok(forms) = registry.aliases_of(&id) {
        if !forms.is_empty() {
            node.all_forms = forms.into_iter().collect();
        }
    }
    node
}

/// Full term resolution: preprocess, disambiguate, canonicalize.
pub struct Canonicalizer {
    disambiguator: Arc<Disambiguator>,
}

impl Canonicalizer {
    pub fn new(disambiguator: Arc<Disambiguator>) -> Self {
        Self { disambiguator }
    }

    #[must_use]
    pub fn disambiguator(&self) -> &Arc<Disambiguator> {
        &self.disambiguator
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<dyn SynonymRegistry> {
        self.disambiguator.registry()
    }

    /// Resolves one attribute value. `hints` are nearby words used only when
    /// the term is ambiguous.
    pub async fn resolve(&self, term: &str, attribute_key: &str, hints: &[String]) -> ConceptNode {
        let normalized = normalize(term, Some(attribute_key));
        if normalized.is_empty() {
            return ConceptNode::fallback(term);
        }
        let context = DisambiguationContext::new(Some(attribute_key), hints.iter().cloned());
        let sense = self
            .disambiguator
            .disambiguate_or_fallback(&normalized, &context)
            .await;
        let node = canonicalize(
            Some(&sense),
            &normalized,
            attribute_key,
            self.registry().as_ref(),
        );

        if compact_form(term) != compact_form(&normalized) {
            if let Err(err) = self.registry().insert_if_absent(term, &node.concept_id) {
                log::debug!("Could not bind raw form '{term}': {err}");
            }
        }
        node
    }

    async fn resolve_term(&self, term: &mut Term, attribute_key: &str, hints: &[String]) {
        if term.concept().is_some() {
            return;
        }
        let node = self.resolve(term.text(), attribute_key, hints).await;
        *term = Term::Resolved {
            text: term.text().to_string(),
            concept: node,
        };
    }

    async fn resolve_bag(&self, bag: &mut AttributeBag, hints: &[String]) {
        for (key, value) in &mut bag.categorical {
            self.resolve_term(value, key, hints).await;
        }
    }

    /// Attaches concepts to every categorical value of `listing`: item types,
    /// item attributes, both attribute bags and the exclusion lists. Values
    /// that already carry a concept are left alone.
    pub async fn canonicalize_listing(&self, listing: &mut Listing) {
        let base: Vec<String> = listing
            .domain
            .iter()
            .chain(listing.category.iter())
            .cloned()
            .collect();

        for item in &mut listing.items {
            self.resolve_term(&mut item.item_type, TYPE_KEY, &base).await;
            let mut hints = base.clone();
            hints.push(item.item_type.text().to_string());
            for (key, value) in &mut item.categorical {
                self.resolve_term(value, key, &hints).await;
            }
        }

        self.resolve_bag(&mut listing.other_party_preferences, &base)
            .await;
        self.resolve_bag(&mut listing.self_attributes, &base).await;

        for term in &mut listing.item_exclusions {
            self.resolve_term(term, TYPE_KEY, &base).await;
        }
        for term in &mut listing.other_party_exclusions {
            self.resolve_term(term, EXCLUSION_KEY, &base).await;
        }
    }
}
