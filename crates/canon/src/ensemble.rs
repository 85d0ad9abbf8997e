//! Sense scoring: independent scorers combined by a weight-renormalizing
//! reducer.

use crate::config::EnsembleWeights;
use crate::disambiguate::DisambiguationContext;
use async_trait::async_trait;
use concord_lexicon::{
    cosine_similarity, shares_stem, CandidateSense, Embedder, LexicalHierarchy,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One scorer's opinion of one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerOutput {
    /// In `[0, 1]`
    pub score: f32,
    pub available: bool,
}

impl ScorerOutput {
    #[must_use]
    pub fn of(score: f32) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            available: true,
        }
    }

    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            score: 0.0,
            available: false,
        }
    }
}

/// Scores every candidate of one disambiguation call.
///
/// Must return exactly one output per candidate, in order. A scorer that
/// cannot judge (no model, no usable context) reports `unavailable` and its
/// weight goes to the others.
#[async_trait]
pub trait SenseScorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(
        &self,
        context: &DisambiguationContext,
        candidates: &[CandidateSense],
    ) -> Vec<ScorerOutput>;
}

/// Lesk-style overlap between the context words and each candidate's label,
/// gloss, forms and hypernyms.
#[derive(Debug, Clone)]
pub struct ContextScorer {
    min_prefix: usize,
}

impl ContextScorer {
    #[must_use]
    pub fn new(min_prefix: usize) -> Self {
        Self { min_prefix }
    }
}

#[async_trait]
impl SenseScorer for ContextScorer {
    fn name(&self) -> &str {
        "context"
    }

    async fn score(
        &self,
        context: &DisambiguationContext,
        candidates: &[CandidateSense],
    ) -> Vec<ScorerOutput> {
        let words = context.tokens();
        if words.is_empty() {
            return vec![ScorerOutput::unavailable(); candidates.len()];
        }
        candidates
            .iter()
            .map(|candidate| {
                let sense_words: BTreeSet<String> =
                    concord_lexicon::content_tokens(&candidate.scoring_text())
                        .into_iter()
                        .collect();
                let hits = words
                    .iter()
                    .filter(|w| sense_words.iter().any(|s| shares_stem(w, s, self.min_prefix)))
                    .count();
                ScorerOutput::of(hits as f32 / words.len() as f32)
            })
            .collect()
    }
}

/// Cosine similarity between the context and each candidate's scoring text.
pub struct EmbeddingScorer {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl SenseScorer for EmbeddingScorer {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(
        &self,
        context: &DisambiguationContext,
        candidates: &[CandidateSense],
    ) -> Vec<ScorerOutput> {
        let text = context.text();
        if text.trim().is_empty() {
            return vec![ScorerOutput::unavailable(); candidates.len()];
        }
        let query = match self.embedder.embed(&text).await {
            Ok(query) => query,
            Err(err) => {
                log::debug!("Embedding scorer unavailable: {err}");
                return vec![ScorerOutput::unavailable(); candidates.len()];
            }
        };

        let mut out = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.embedder.embed(&candidate.scoring_text()).await {
                Ok(vector) => out.push(ScorerOutput::of(cosine_similarity(&query, &vector))),
                Err(err) => {
                    log::debug!("Embedding failed for {}: {err}", candidate.source_id);
                    out.push(ScorerOutput::unavailable());
                }
            }
        }
        out
    }
}

/// Hierarchy path similarity between each candidate and the senses of the
/// context words.
///
/// Candidates outside the hierarchy are placed through their nearest
/// hypernym that is inside it, one hop further away.
#[derive(Debug, Clone)]
pub struct PathScorer {
    hierarchy: Arc<LexicalHierarchy>,
}

impl PathScorer {
    pub fn new(hierarchy: Arc<LexicalHierarchy>) -> Self {
        Self { hierarchy }
    }

    fn anchor(&self, candidate: &CandidateSense) -> Option<(String, u32)> {
        if self.hierarchy.contains(&candidate.source_id) {
            return Some((candidate.source_id.clone(), 0));
        }
        candidate
            .hypernyms
            .iter()
            .zip(1u32..)
            .find(|(h, _)| self.hierarchy.contains(&h.id))
            .map(|(h, hops)| (h.id.clone(), hops))
    }
}

#[async_trait]
impl SenseScorer for PathScorer {
    fn name(&self) -> &str {
        "path"
    }

    async fn score(
        &self,
        context: &DisambiguationContext,
        candidates: &[CandidateSense],
    ) -> Vec<ScorerOutput> {
        let context_senses: BTreeSet<String> = context
            .tokens()
            .iter()
            .flat_map(|w| self.hierarchy.senses(w))
            .map(|s| s.id.clone())
            .collect();
        if context_senses.is_empty() {
            return vec![ScorerOutput::unavailable(); candidates.len()];
        }

        candidates
            .iter()
            .map(|candidate| {
                let Some((anchor, hops)) = self.anchor(candidate) else {
                    return ScorerOutput::unavailable();
                };
                let best = context_senses
                    .iter()
                    .filter_map(|ctx| self.hierarchy.path_similarity(&anchor, ctx))
                    .map(|sim| {
                        // Extra hops lengthen the path: 1/(1+d) becomes 1/(1+d+hops).
                        let d = 1.0 / sim - 1.0;
                        1.0 / (1.0 + d + hops as f32)
                    })
                    .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s))));
                best.map_or_else(ScorerOutput::unavailable, ScorerOutput::of)
            })
            .collect()
    }
}

/// Weighted scorers plus the reducer that combines them.
pub struct Ensemble {
    members: Vec<(Arc<dyn SenseScorer>, f32)>,
}

impl Ensemble {
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, scorer: Arc<dyn SenseScorer>, weight: f32) -> Self {
        self.members.push((scorer, weight.max(0.0)));
        self
    }

    /// Context (primary), embedding (secondary) and path (tertiary) scorers.
    pub fn standard(
        weights: EnsembleWeights,
        min_prefix: usize,
        embedder: Option<Arc<dyn Embedder>>,
        hierarchy: Option<Arc<LexicalHierarchy>>,
    ) -> Self {
        let mut ensemble =
            Self::new().with(Arc::new(ContextScorer::new(min_prefix)), weights.context);
        if let Some(embedder) = embedder {
            ensemble = ensemble.with(Arc::new(EmbeddingScorer::new(embedder)), weights.embedding);
        }
        if let Some(hierarchy) = hierarchy {
            ensemble = ensemble.with(Arc::new(PathScorer::new(hierarchy)), weights.path);
        }
        ensemble
    }

    #[must_use]
    pub fn scorer_names(&self) -> Vec<&str> {
        self.members.iter().map(|(s, _)| s.name()).collect()
    }

    /// Fills `score` on every candidate.
    pub async fn score(&self, context: &DisambiguationContext, candidates: &mut [CandidateSense]) {
        let mut per_scorer = Vec::with_capacity(self.members.len());
        for (scorer, weight) in &self.members {
            let outputs = scorer.score(context, candidates).await;
            if outputs.len() != candidates.len() {
                log::warn!(
                    "Scorer '{}' returned {} outputs for {} candidates; ignoring it",
                    scorer.name(),
                    outputs.len(),
                    candidates.len()
                );
                continue;
            }
            per_scorer.push((outputs, *weight));
        }

        for (idx, candidate) in candidates.iter_mut().enumerate() {
            let column: Vec<(ScorerOutput, f32)> = per_scorer
                .iter()
                .map(|(outputs, weight)| (outputs[idx], *weight))
                .collect();
            candidate.score = combine(&column);
        }
    }
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted mean over the available outputs only; 0 when none is available.
#[must_use]
pub fn combine(outputs: &[(ScorerOutput, f32)]) -> f32 {
    let (sum, total) = outputs
        .iter()
        .filter(|(o, w)| o.available && *w > 0.0)
        .fold((0.0f32, 0.0f32), |(sum, total), (o, w)| {
            (sum + o.score * w, total + w)
        });
    if total <= 0.0 {
        0.0
    } else {
        sum / total
    }
}
