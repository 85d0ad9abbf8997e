use crate::error::Result;
use crate::text::{content_tokens, shares_stem};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Last-resort sense picker consulted when the ensemble is not confident.
///
/// `candidates` are numbered definitions (`1` is the first); the answer is
/// free text and is parsed with [`parse_choice`].
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    fn name(&self) -> &str;

    async fn rank(&self, context: &str, candidates: &[String]) -> Result<String>;
}

type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn ReasoningModel>>> + Send + Sync>;

/// Once-initialized handle to a reasoning model.
///
/// The loader runs on first use only; a failed load is remembered, so later
/// escalations skip the model instead of retrying it every call.
pub struct LazyReasoner {
    cell: OnceCell<Option<Arc<dyn ReasoningModel>>>,
    loader: Option<Loader>,
    loads: AtomicUsize,
}

impl LazyReasoner {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn ReasoningModel>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Some(Arc::new(move || loader().boxed())),
            loads: AtomicUsize::new(0),
        }
    }

    /// Handle that never escalates.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            cell: OnceCell::new_with(Some(None)),
            loader: None,
            loads: AtomicUsize::new(0),
        }
    }

    /// Handle around an already constructed model.
    #[must_use]
    pub fn ready(model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Some(model))),
            loader: None,
            loads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Times the loader has run.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub async fn get(&self) -> Option<Arc<dyn ReasoningModel>> {
        self.cell
            .get_or_init(|| async {
                let loader = self.loader.as_ref()?;
                self.loads.fetch_add(1, Ordering::Relaxed);
                match loader().await {
                    Ok(model) => {
                        log::info!("Reasoning model '{}' loaded", model.name());
                        Some(model)
                    }
                    Err(err) => {
                        log::warn!("Reasoning model unavailable: {err}");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Index of the candidate the model picks, or `None` when the model is
    /// unavailable, fails, or answers something unparseable.
    pub async fn choose(&self, context: &str, candidates: &[String]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let model = self.get().await?;
        match model.rank(context, candidates).await {
            Ok(answer) => {
                let choice = parse_choice(&answer, candidates);
                if choice.is_none() {
                    log::debug!("Unparseable answer from '{}': {answer:?}", model.name());
                }
                choice
            }
            Err(err) => {
                log::debug!("Reasoning model '{}' failed: {err}", model.name());
                None
            }
        }
    }
}

impl std::fmt::Debug for LazyReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyReasoner")
            .field("initialized", &self.cell.initialized())
            .field("loads", &self.load_count())
            .finish_non_exhaustive()
    }
}

/// Reads a model answer: the first number in `1..=n` wins, otherwise an
/// answer equal to a candidate's label (the text before `:`) selects it.
#[must_use]
pub fn parse_choice(answer: &str, candidates: &[String]) -> Option<usize> {
    let n = candidates.len();
    let number = answer
        .split(|c: char| !c.is_ascii_digit())
        .filter(|chunk| !chunk.is_empty())
        .find_map(|chunk| chunk.parse::<usize>().ok());
    if let Some(number) = number {
        return (1..=n).contains(&number).then(|| number - 1);
    }

    let wanted = answer.trim().trim_end_matches('.').to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    candidates.iter().position(|candidate| {
        let label = candidate.split(':').next().unwrap_or(candidate);
        label.trim().to_lowercase() == wanted || candidate.trim().to_lowercase() == wanted
    })
}

/// Offline reasoning model: picks the definition sharing the most stems with
/// the context, and answers "none" when nothing overlaps or the best score
/// is tied.
#[derive(Debug, Clone)]
pub struct GlossOverlapReasoner {
    min_prefix: usize,
}

impl GlossOverlapReasoner {
    #[must_use]
    pub fn new(min_prefix: usize) -> Self {
        Self { min_prefix }
    }
}

impl Default for GlossOverlapReasoner {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl ReasoningModel for GlossOverlapReasoner {
    fn name(&self) -> &str {
        "gloss-overlap"
    }

    async fn rank(&self, context: &str, candidates: &[String]) -> Result<String> {
        let context = content_tokens(context);
        let scores: Vec<usize> = candidates
            .iter()
            .map(|candidate| {
                content_tokens(candidate)
                    .iter()
                    .filter(|t| context.iter().any(|c| shares_stem(c, t, self.min_prefix)))
                    .count()
            })
            .collect();
        let best = scores.iter().copied().max().unwrap_or(0);
        let winners: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == best)
            .map(|(i, _)| i)
            .collect();
        if best == 0 || winners.len() != 1 {
            return Ok("none".to_string());
        }
        Ok((winners[0] + 1).to_string())
    }
}
