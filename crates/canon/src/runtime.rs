//! Wiring a [`Canonicalizer`] from a [`ConcordConfig`].

use crate::canonicalize::Canonicalizer;
use crate::config::{ConcordConfig, LexiconPaths, RegistryConfig};
use crate::disambiguate::{Disambiguator, DisambiguatorSettings};
use crate::ensemble::Ensemble;
use crate::error::Result;
use concord_lexicon::{
    CachedEmbedder, ConceptNetworkSource, Embedder, GlossOverlapReasoner, HashingEmbedder,
    HierarchySource, KnowledgeGraphSource, LazyReasoner, LexicalHierarchy, LexicalSource,
    ReasoningModel,
};
use concord_registry::{InMemoryRegistry, PersistentRegistry, SynonymRegistry};
use std::sync::Arc;

/// Registry plus the persistent backing, when there is one, so callers can
/// flush before exit.
#[derive(Clone)]
pub struct RegistryHandle {
    registry: Arc<dyn SynonymRegistry>,
    persistent: Option<Arc<PersistentRegistry>>,
}

impl RegistryHandle {
    pub async fn open(config: &RegistryConfig) -> Result<Self> {
        match &config.path {
            Some(path) => {
                let persistent =
                    Arc::new(PersistentRegistry::open(path, config.flush_interval).await?);
                log::info!("Synonym registry at {}", path.display());
                Ok(Self {
                    registry: persistent.clone(),
                    persistent: Some(persistent),
                })
            }
            None => Ok(Self::in_memory()),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            registry: Arc::new(InMemoryRegistry::new()),
            persistent: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<dyn SynonymRegistry> {
        self.registry.clone()
    }

    /// Writes pending bindings. No-op for in-memory registries.
    pub async fn flush(&self) -> Result<()> {
        if let Some(persistent) = &self.persistent {
            persistent.flush().await?;
        }
        Ok(())
    }
}

/// Knowledge sources in fan-out order. The hierarchy is also handed to the
/// path scorer.
pub struct Sources {
    pub hierarchy: Arc<LexicalHierarchy>,
    pub sources: Vec<Arc<dyn LexicalSource>>,
}

/// Loads each source from its configured dump, or the embedded seed.
pub async fn load_sources(paths: &LexiconPaths) -> Result<Sources> {
    let hierarchy = Arc::new(match &paths.lexical {
        Some(path) => LexicalHierarchy::load(path).await?,
        None => LexicalHierarchy::builtin()?,
    });
    let network = match &paths.concept_network {
        Some(path) => ConceptNetworkSource::load(path).await?,
        None => ConceptNetworkSource::builtin()?,
    };
    let graph = match &paths.knowledge_graph {
        Some(path) => KnowledgeGraphSource::load(path).await?,
        None => KnowledgeGraphSource::builtin()?,
    };
    log::debug!("Lexical hierarchy holds {} synsets", hierarchy.len());

    let sources: Vec<Arc<dyn LexicalSource>> = vec![
        Arc::new(HierarchySource::new(hierarchy.clone())),
        Arc::new(network),
        Arc::new(graph),
    ];
    Ok(Sources { hierarchy, sources })
}

/// Reasoning handle that builds the offline gloss-overlap model on first use.
#[must_use]
pub fn lazy_reasoner(min_prefix: usize) -> LazyReasoner {
    LazyReasoner::new(move || async move {
        log::debug!("Loading gloss-overlap reasoning model");
        Ok(Arc::new(GlossOverlapReasoner::new(min_prefix)) as Arc<dyn ReasoningModel>)
    })
}

/// Builds the full resolution stack over `registry`.
pub async fn build_canonicalizer(
    config: &ConcordConfig,
    registry: Arc<dyn SynonymRegistry>,
) -> Result<Canonicalizer> {
    let Sources { hierarchy, sources } = load_sources(&config.lexicon).await?;
    let min_prefix = config.matching.min_prefix;

    let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
        Arc::new(HashingEmbedder::default()),
        CachedEmbedder::DEFAULT_CAPACITY,
    ));
    let ensemble = Ensemble::standard(
        config.disambiguation.weights,
        min_prefix,
        Some(embedder),
        Some(hierarchy),
    );
    log::debug!("Ensemble scorers: {:?}", ensemble.scorer_names());

    let disambiguator = Disambiguator::new(
        sources,
        registry,
        ensemble,
        Arc::new(lazy_reasoner(min_prefix)),
        DisambiguatorSettings::from(&config.disambiguation),
    );
    Ok(Canonicalizer::new(Arc::new(disambiguator)))
}
