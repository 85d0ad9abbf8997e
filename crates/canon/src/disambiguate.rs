use crate::config::DisambiguationConfig;
use crate::ensemble::Ensemble;
use concord_lexicon::{content_tokens, CandidateSense, HypernymRef, LazyReasoner, LexicalSource};
use concord_protocol::ConceptSource;
use concord_registry::SynonymRegistry;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What a term is being resolved against: the attribute it fills and nearby
/// words (domain, category, item type, sibling values).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisambiguationContext {
    pub attribute_key: Option<String>,
    pub hints: Vec<String>,
    exclude: Vec<String>,
}

impl DisambiguationContext {
    pub fn new<I, S>(attribute_key: Option<&str>, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute_key: attribute_key.map(str::to_string),
            hints: hints.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    /// Drops the words of `term` from the context; they match every candidate
    /// equally and only dilute the scores.
    #[must_use]
    pub fn excluding(mut self, term: &str) -> Self {
        self.exclude = content_tokens(term);
        self
    }

    /// Key and hints as one string.
    #[must_use]
    pub fn text(&self) -> String {
        self.tokens().join(" ")
    }

    /// Distinct content words of key and hints, in order.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let key = self
            .attribute_key
            .as_deref()
            .map(|k| k.replace('_', " "))
            .unwrap_or_default();
        for part in std::iter::once(key.as_str()).chain(self.hints.iter().map(String::as_str)) {
            for token in content_tokens(part) {
                if !self.exclude.contains(&token) && !out.contains(&token) {
                    out.push(token);
                }
            }
        }
        out
    }
}

/// How a sense was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The term was already bound in the registry
    Registry,
    /// The local lexical source knows exactly one sense
    SingleSense,
    /// Highest ensemble score
    Ensemble,
    /// Picked by the reasoning model after a low-margin ensemble
    Reasoning,
    /// Nothing found; the literal term stands in
    Fallback,
}

/// Winning sense of one disambiguation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisambiguatedSense {
    pub concept_id: String,
    pub label: String,
    pub gloss: String,
    pub all_forms: Vec<String>,
    /// Nearest parent first
    pub hypernyms: Vec<HypernymRef>,
    pub source: ConceptSource,
    pub resolution: Resolution,
    pub confidence: f32,
}

impl DisambiguatedSense {
    #[must_use]
    pub fn from_candidate(candidate: CandidateSense, resolution: Resolution) -> Self {
        let source = candidate.concept_source();
        Self {
            concept_id: candidate.source_id,
            label: candidate.label,
            gloss: candidate.gloss,
            all_forms: candidate.all_forms,
            hypernyms: candidate.hypernyms,
            source,
            resolution,
            confidence: candidate.score,
        }
    }

    /// Literal stand-in for a term no source could resolve.
    #[must_use]
    pub fn fallback(term: &str) -> Self {
        let literal = term.trim().to_lowercase();
        Self {
            concept_id: literal.clone(),
            label: literal.clone(),
            gloss: String::new(),
            all_forms: vec![literal],
            hypernyms: Vec::new(),
            source: ConceptSource::fallback(),
            resolution: Resolution::Fallback,
            confidence: 0.0,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.resolution == Resolution::Fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisambiguatorSettings {
    pub adapter_timeout: Duration,
    pub margin_threshold: f32,
    pub reasoning_top_n: usize,
}

impl From<&DisambiguationConfig> for DisambiguatorSettings {
    fn from(cfg: &DisambiguationConfig) -> Self {
        Self {
            adapter_timeout: cfg.adapter_timeout,
            margin_threshold: cfg.margin_threshold,
            reasoning_top_n: cfg.reasoning_top_n,
        }
    }
}

impl Default for DisambiguatorSettings {
    fn default() -> Self {
        Self::from(&DisambiguationConfig::default())
    }
}

/// Picks one sense for a term from every configured source.
pub struct Disambiguator {
    sources: Vec<Arc<dyn LexicalSource>>,
    registry: Arc<dyn SynonymRegistry>,
    ensemble: Ensemble,
    reasoner: Arc<LazyReasoner>,
    settings: DisambiguatorSettings,
}

impl Disambiguator {
    pub fn new(
        sources: Vec<Arc<dyn LexicalSource>>,
        registry: Arc<dyn SynonymRegistry>,
        ensemble: Ensemble,
        reasoner: Arc<LazyReasoner>,
        settings: DisambiguatorSettings,
    ) -> Self {
        Self {
            sources,
            registry,
            ensemble,
            reasoner,
            settings,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<dyn SynonymRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn reasoner(&self) -> &Arc<LazyReasoner> {
        &self.reasoner
    }

    /// Best sense for `term`, or `None` when no source knows it.
    pub async fn disambiguate(
        &self,
        term: &str,
        context: &DisambiguationContext,
    ) -> Option<DisambiguatedSense> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }

        if let Some(sense) = self.from_registry(term) {
            log::debug!("'{term}' resolved from registry as {}", sense.concept_id);
            return Some(sense);
        }

        let (local, remote): (Vec<_>, Vec<_>) =
            self.sources.iter().cloned().partition(|s| s.is_local());
        let local_candidates = self.gather(term, &local).await;
        if local_candidates.len() == 1 {
            let mut only = local_candidates;
            let mut sense = only.remove(0);
            sense.score = 1.0;
            log::debug!("'{term}' has a single local sense {}", sense.source_id);
            return Some(DisambiguatedSense::from_candidate(sense, Resolution::SingleSense));
        }

        let mut candidates = local_candidates;
        candidates.extend(self.gather(term, &remote).await);
        let mut candidates = merge_by_id(candidates);

        match candidates.len() {
            0 => {
                log::info!("No sense found for '{term}' in any source");
                None
            }
            1 => {
                let mut sense = candidates.remove(0);
                sense.score = 1.0;
                Some(DisambiguatedSense::from_candidate(sense, Resolution::Ensemble))
            }
            _ => Some(self.pick(term, context, candidates).await),
        }
    }

    /// Like [`Self::disambiguate`], but never empty-handed: unknown terms come
    /// back as a fallback sense carrying the lowercased literal.
    pub async fn disambiguate_or_fallback(
        &self,
        term: &str,
        context: &DisambiguationContext,
    ) -> DisambiguatedSense {
        match self.disambiguate(term, context).await {
            Some(sense) => sense,
            None => DisambiguatedSense::fallback(term),
        }
    }

    fn from_registry(&self, term: &str) -> Option<DisambiguatedSense> {
        let id = match self.registry.lookup(term) {
            Ok(found) => found?,
            Err(err) => {
                log::debug!("Registry lookup for '{term}' failed: {err}");
                return None;
            }
        };
        let label = self
            .registry
            .label_of(&id)
            .ok()
            .flatten()
            .unwrap_or_else(|| term.to_lowercase());
        Some(DisambiguatedSense {
            all_forms: vec![term.to_string()],
            concept_id: id,
            label,
            gloss: String::new(),
            hypernyms: Vec::new(),
            source: ConceptSource::registry(),
            resolution: Resolution::Registry,
            confidence: 1.0,
        })
    }

    /// Queries `sources` concurrently, each under the adapter timeout. Errors
    /// and timeouts count as "no candidates".
    async fn gather(&self, term: &str, sources: &[Arc<dyn LexicalSource>]) -> Vec<CandidateSense> {
        let timeout = self.settings.adapter_timeout;
        let calls = sources.iter().map(|source| async move {
            match tokio::time::timeout(timeout, source.lookup(term)).await {
                Ok(Ok(found)) => found,
                Ok(Err(err)) => {
                    log::debug!("Source '{}' failed for '{term}': {err}", source.name());
                    Vec::new()
                }
                Err(_) => {
                    log::debug!(
                        "Source '{}' timed out after {timeout:?} for '{term}'",
                        source.name()
                    );
                    Vec::new()
                }
            }
        });
        join_all(calls).await.into_iter().flatten().collect()
    }

    async fn pick(
        &self,
        term: &str,
        context: &DisambiguationContext,
        mut candidates: Vec<CandidateSense>,
    ) -> DisambiguatedSense {
        let context = context.clone().excluding(term);
        self.ensemble.score(&context, &mut candidates).await;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let margin = candidates[0].score - candidates[1].score;
        log::debug!(
            "'{term}': top {} ({:.3}), margin {margin:.3}",
            candidates[0].source_id,
            candidates[0].score
        );
        if margin >= self.settings.margin_threshold {
            return DisambiguatedSense::from_candidate(
                candidates.swap_remove(0),
                Resolution::Ensemble,
            );
        }

        let top_n = self.settings.reasoning_top_n.min(candidates.len());
        let definitions: Vec<String> = candidates[..top_n]
            .iter()
            .map(CandidateSense::definition)
            .collect();
        let prompt = format!("{term} ({})", context.text());
        match self.reasoner.choose(&prompt, &definitions).await {
            Some(idx) => {
                log::debug!("'{term}': reasoning model chose {}", candidates[idx].source_id);
                DisambiguatedSense::from_candidate(
                    candidates.swap_remove(idx),
                    Resolution::Reasoning,
                )
            }
            None => {
                DisambiguatedSense::from_candidate(candidates.swap_remove(0), Resolution::Ensemble)
            }
        }
    }
}

/// Folds candidates sharing a `source_id` into the first one seen.
fn merge_by_id(candidates: Vec<CandidateSense>) -> Vec<CandidateSense> {
    let mut out: Vec<CandidateSense> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for candidate in candidates {
        match index.get(&candidate.source_id) {
            Some(&pos) => out[pos].absorb(candidate),
            None => {
                index.insert(candidate.source_id.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_protocol::SourceKind;

    #[test]
    fn context_tokens_skip_term_and_duplicates() {
        let ctx = DisambiguationContext::new(
            Some("item_type"),
            ["electronics", "Laptop bag", "electronics"],
        )
        .excluding("laptop");
        assert_eq!(ctx.tokens(), vec!["item", "type", "electronics", "bag"]);
    }

    #[test]
    fn merge_combines_same_ids_across_sources() {
        let merged = merge_by_id(vec![
            CandidateSense::new(SourceKind::Lexical, "car.n.01", "car"),
            CandidateSense::new(SourceKind::ConceptNetwork, "/c/en/car", "car"),
            CandidateSense::new(SourceKind::KnowledgeGraph, "car.n.01", "car")
                .forms(["automobile"]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].concept_source().as_str(), "lexical+knowledge-graph");
    }

    #[test]
    fn fallback_sense_is_the_lowercased_literal() {
        let sense = DisambiguatedSense::fallback("  Zyxwv ");
        assert_eq!(sense.concept_id, "zyxwv");
        assert!(sense.source.is_fallback());
        assert!(sense.is_fallback());
    }
}
