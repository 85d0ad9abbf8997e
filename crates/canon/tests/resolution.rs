use concord_canon::{
    build_canonicalizer, canonicalize, Canonicalizer, ConcordConfig, DisambiguatedSense,
    Resolution,
};
use concord_lexicon::HypernymRef;
use concord_protocol::{
    AttributeBag, ConceptSource, Intent, Item, Listing, SourceKind, Subintent,
};
use concord_registry::{InMemoryRegistry, SynonymRegistry};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Barrier};
use std::thread;

async fn stack() -> Canonicalizer {
    build_canonicalizer(&ConcordConfig::default(), Arc::new(InMemoryRegistry::new()))
        .await
        .unwrap()
}

fn hints(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

#[tokio::test]
async fn condition_variants_converge() {
    let canon = stack().await;
    let used = canon.resolve("used", "condition", &[]).await;
    let second_hand = canon.resolve("Second-Hand", "condition", &[]).await;
    let preloved = canon.resolve("preloved", "condition", &[]).await;
    let barely = canon.resolve("barely used", "condition", &[]).await;

    assert_eq!(used.concept_id, "used.a.01");
    assert_eq!(second_hand.concept_id, used.concept_id);
    assert_eq!(preloved.concept_id, used.concept_id);
    assert_eq!(barely.concept_id, used.concept_id);
    assert_eq!(used.concept_path.first().map(String::as_str), Some("condition"));
    assert_eq!(used.concept_path.last().map(String::as_str), Some("used.a.01"));
    assert!(used.has_ancestor("condition.n.01"));
}

#[tokio::test]
async fn convergence_does_not_depend_on_order() {
    let canon = stack().await;
    let preloved = canon.resolve("preloved", "condition", &[]).await;
    let used = canon.resolve("used", "condition", &[]).await;
    let second_hand = canon.resolve("second hand", "condition", &[]).await;

    assert_eq!(used.concept_id, preloved.concept_id);
    assert_eq!(second_hand.concept_id, preloved.concept_id);
}

#[tokio::test]
async fn repeated_resolution_is_idempotent() {
    let canon = stack().await;
    let first = canon.resolve("pre-owned", "condition", &[]).await;
    let snapshot = canon.registry().snapshot();
    let second = canon.resolve("pre-owned", "condition", &[]).await;

    assert_eq!(first.concept_id, second.concept_id);
    assert_eq!(first.concept_path, second.concept_path);
    assert_eq!(first.all_forms, second.all_forms);
    assert_eq!(canon.registry().snapshot().aliases, snapshot.aliases);
}

#[tokio::test]
async fn notebook_follows_electronics_context() {
    let canon = stack().await;
    let node = canon.resolve("notebook", "type", &hints(&["electronics"])).await;
    assert_eq!(node.concept_id, "laptop.n.01");
    assert!(node.has_ancestor("computer.n.01"));
}

#[tokio::test]
async fn notebook_follows_stationery_context() {
    let canon = stack().await;
    let node = canon.resolve("notebook", "type", &hints(&["stationery"])).await;
    assert_eq!(node.concept_id, "notebook.n.01");
}

#[tokio::test]
async fn apple_as_brand_is_the_company() {
    let canon = stack().await;
    let node = canon
        .resolve("Apple", "brand", &hints(&["electronics", "smartphone"]))
        .await;
    assert_eq!(node.concept_id, "kg:Q312");
    assert!(node.has_ancestor("company.n.01"));
}

#[tokio::test]
async fn knowledge_graph_entity_gets_synset_ancestors() {
    let canon = stack().await;
    let node = canon.resolve("Samsung Galaxy", "type", &hints(&["electronics"])).await;
    assert_eq!(node.concept_id, "kg:Q20800404");
    assert!(node.has_ancestor("smartphone.n.01"), "{:?}", node.concept_path);
    assert_eq!(
        canon.registry().label_of("smartphone.n.01").unwrap().as_deref(),
        Some("smartphone")
    );
}

#[tokio::test]
async fn unknown_terms_become_literal_concepts() {
    let canon = stack().await;
    let node = canon.resolve("Zorblax", "brand", &[]).await;
    assert_eq!(node.concept_id, "zorblax");
    assert!(node.is_fallback());
    assert_eq!(node.concept_path, vec!["brand", "zorblax"]);
}

#[tokio::test]
async fn listing_terms_are_resolved_in_place() {
    let canon = stack().await;
    let mut listing = Listing::new(Intent::Product, Subintent::Buy);
    listing.domain.insert("electronics".to_string());
    listing
        .items
        .push(Item::new("smart phone").with("condition", "2nd hand"));
    listing.other_party_preferences = AttributeBag::default().with("gender", "female");

    canon.canonicalize_listing(&mut listing).await;

    let item = &listing.items[0];
    assert_eq!(item.item_type.text(), "smart phone");
    assert_eq!(
        item.item_type.concept().map(|c| c.concept_id.as_str()),
        Some("smartphone.n.01")
    );
    assert_eq!(
        item.categorical["condition"].concept().map(|c| c.concept_id.as_str()),
        Some("used.a.01")
    );
    assert!(listing.other_party_preferences.categorical["gender"]
        .concept()
        .is_some());

    let before = listing.clone();
    canon.canonicalize_listing(&mut listing).await;
    assert_eq!(listing, before);
}

fn sense(id: &str, label: &str, forms: &[&str], kind: SourceKind) -> DisambiguatedSense {
    DisambiguatedSense {
        concept_id: id.to_string(),
        label: label.to_string(),
        gloss: String::new(),
        all_forms: forms.iter().map(|f| (*f).to_string()).collect(),
        hypernyms: vec![HypernymRef::new("condition.n.01", "condition")],
        source: ConceptSource::from_kinds([kind]),
        resolution: Resolution::SingleSense,
        confidence: 1.0,
    }
}

#[test]
fn racing_sources_converge_on_one_id() {
    let lexical = sense(
        "used.a.01",
        "used",
        &["used", "second-hand", "pre-owned"],
        SourceKind::Lexical,
    );
    let network = sense(
        "/c/en/preloved",
        "pre-loved",
        &["pre-loved", "used", "second hand"],
        SourceKind::ConceptNetwork,
    );

    for _ in 0..500 {
        let registry = InMemoryRegistry::new();
        let barrier = Barrier::new(2);
        let (a, b) = thread::scope(|scope| {
            let a = scope.spawn(|| {
                barrier.wait();
                canonicalize(Some(&lexical), "used", "condition", &registry)
            });
            let b = scope.spawn(|| {
                barrier.wait();
                canonicalize(Some(&network), "pre-loved", "condition", &registry)
            });
            (a.join().unwrap(), b.join().unwrap())
        });

        assert_eq!(a.concept_id, b.concept_id);
        assert_eq!(
            registry.lookup("used").unwrap(),
            registry.lookup("pre-loved").unwrap()
        );
        assert_eq!(
            registry.lookup("second hand").unwrap(),
            Some(a.concept_id.clone())
        );
    }
}
