use async_trait::async_trait;
use concord_canon::{
    canonicalize, Canonicalizer, DisambiguationContext, Disambiguator, DisambiguatorSettings,
    Ensemble, EnsembleWeights, Resolution,
};
use concord_lexicon::{
    CandidateSense, HierarchySource, HypernymRef, LazyReasoner, LexicalHierarchy, LexicalSource,
    LexiconError, ReasoningModel,
};
use concord_protocol::{ConceptSource, SourceKind};
use concord_registry::{InMemoryRegistry, SynonymRegistry};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

enum Behaviour {
    Answer(Vec<CandidateSense>),
    Fail,
    Hang,
}

struct ScriptedSource {
    name: &'static str,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LexicalSource for ScriptedSource {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ConceptNetwork
    }

    async fn lookup(&self, _term: &str) -> concord_lexicon::Result<Vec<CandidateSense>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Answer(senses) => Ok(senses.clone()),
            Behaviour::Fail => Err(LexiconError::Unavailable(format!("{} is down", self.name))),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn hypernyms_of(&self, _concept_id: &str) -> concord_lexicon::Result<Vec<HypernymRef>> {
        Ok(Vec::new())
    }
}

/// Always answers with the second definition.
struct SecondChoice;

#[async_trait]
impl ReasoningModel for SecondChoice {
    fn name(&self) -> &str {
        "second-choice"
    }

    async fn rank(
        &self,
        _context: &str,
        _candidates: &[String],
    ) -> concord_lexicon::Result<String> {
        Ok("2".to_string())
    }
}

fn disambiguator(
    sources: Vec<Arc<dyn LexicalSource>>,
    reasoner: LazyReasoner,
) -> Disambiguator {
    let registry: Arc<dyn SynonymRegistry> = Arc::new(InMemoryRegistry::new());
    Disambiguator::new(
        sources,
        registry,
        Ensemble::standard(EnsembleWeights::default(), 5, None, None),
        Arc::new(reasoner),
        DisambiguatorSettings::default(),
    )
}

fn hierarchy_source() -> Arc<dyn LexicalSource> {
    Arc::new(HierarchySource::new(Arc::new(
        LexicalHierarchy::builtin().unwrap(),
    )))
}

fn twin_senses() -> Vec<CandidateSense> {
    vec![
        CandidateSense::new(SourceKind::ConceptNetwork, "/c/en/jag/car", "jag").gloss("luxury car"),
        CandidateSense::new(SourceKind::ConceptNetwork, "/c/en/jag/cat", "jag").gloss("big cat"),
    ]
}

#[tokio::test]
async fn failing_sources_degrade_to_literal() {
    let down = ScriptedSource::new("down", Behaviour::Fail);
    let canon = Canonicalizer::new(Arc::new(disambiguator(
        vec![down.clone()],
        LazyReasoner::disabled(),
    )));

    let node = canon.resolve("Widget", "type", &[]).await;
    assert_eq!(node.concept_id, "widget");
    assert!(node.is_fallback());
    assert_eq!(down.calls(), 1);
}

#[tokio::test]
async fn every_source_failing_yields_the_literal_fallback() {
    let sources: Vec<Arc<dyn LexicalSource>> = vec![
        ScriptedSource::new("network", Behaviour::Fail),
        ScriptedSource::new("graph", Behaviour::Fail),
    ];
    let d = disambiguator(sources, LazyReasoner::disabled());

    let context = DisambiguationContext::new(Some("brand"), ["phone"]);
    let sense = d.disambiguate_or_fallback("Zorblax Pro", &context).await;
    assert!(sense.is_fallback());
    assert_eq!(sense.concept_id, "zorblax pro");
    assert_eq!(sense.source, ConceptSource::fallback());

    let registry = InMemoryRegistry::new();
    let node = canonicalize(Some(&sense), "Zorblax Pro", "brand", &registry);
    assert_eq!(node.concept_id, "zorblax pro");
    assert_eq!(node.source, ConceptSource::fallback());
    assert_eq!(node.concept_path, vec!["brand", "zorblax pro"]);
    assert_eq!(
        registry.lookup("zorblax-pro").unwrap().as_deref(),
        Some("zorblax pro")
    );
}

#[tokio::test(start_paused = true)]
async fn hung_source_is_cut_off_at_the_adapter_timeout() {
    let hung = ScriptedSource::new("hung", Behaviour::Hang);
    let quick = ScriptedSource::new(
        "quick",
        Behaviour::Answer(vec![CandidateSense::new(
            SourceKind::ConceptNetwork,
            "/c/en/doggo",
            "doggo",
        )
        .forms(["dog"])]),
    );
    let d = disambiguator(vec![hung.clone(), quick.clone()], LazyReasoner::disabled());

    let started = tokio::time::Instant::now();
    let sense = d
        .disambiguate("doggo", &DisambiguationContext::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(sense.concept_id, "/c/en/doggo");
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
    assert_eq!(hung.calls(), 1);
}

#[tokio::test]
async fn single_local_sense_skips_remote_sources() {
    let remote = ScriptedSource::new("remote", Behaviour::Answer(twin_senses()));
    let d = disambiguator(
        vec![hierarchy_source(), remote.clone()],
        LazyReasoner::disabled(),
    );

    let sense = d
        .disambiguate("puppy", &DisambiguationContext::default())
        .await
        .unwrap();
    assert_eq!(sense.concept_id, "puppy.n.01");
    assert_eq!(sense.resolution, Resolution::SingleSense);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn ambiguous_local_terms_fan_out() {
    let remote = ScriptedSource::new("remote", Behaviour::Answer(Vec::new()));
    let d = disambiguator(
        vec![hierarchy_source(), remote.clone()],
        LazyReasoner::disabled(),
    );

    let context = DisambiguationContext::new(Some("type"), ["pedal", "vehicle"]);
    let sense = d.disambiguate("bike", &context).await.unwrap();
    assert!(sense.concept_id == "bicycle.n.01" || sense.concept_id == "motorcycle.n.01");
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn reasoning_model_loads_only_on_low_margin() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let reasoner = LazyReasoner::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(Arc::new(SecondChoice) as Arc<dyn ReasoningModel>) }
    });
    let remote = ScriptedSource::new("remote", Behaviour::Answer(twin_senses()));
    let d = disambiguator(vec![hierarchy_source(), remote], reasoner);

    d.disambiguate("puppy", &DisambiguationContext::default())
        .await
        .unwrap();
    assert!(!d.reasoner().is_initialized());

    let sense = d
        .disambiguate("jag", &DisambiguationContext::default())
        .await
        .unwrap();
    assert_eq!(sense.resolution, Resolution::Reasoning);
    assert_eq!(sense.concept_id, "/c/en/jag/cat");

    d.disambiguate("jaguar", &DisambiguationContext::default())
        .await
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(d.reasoner().load_count(), 1);
}

#[tokio::test]
async fn failed_model_load_falls_back_to_ensemble_top() {
    let reasoner = LazyReasoner::new(|| async {
        Err::<Arc<dyn ReasoningModel>, _>(LexiconError::ReasoningError("no weights".to_string()))
    });
    let remote = ScriptedSource::new("remote", Behaviour::Answer(twin_senses()));
    let d = disambiguator(vec![remote], reasoner);

    let sense = d
        .disambiguate("jag", &DisambiguationContext::default())
        .await
        .unwrap();
    assert_eq!(sense.resolution, Resolution::Ensemble);
    assert_eq!(d.reasoner().load_count(), 1);
}
