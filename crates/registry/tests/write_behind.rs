use concord_registry::{read_snapshot, PersistentRegistry, SynonymRegistry};
use std::path::Path;
use std::time::Duration;

async fn wait_for_alias(path: &Path, alias: &str) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(Some(snapshot)) = read_snapshot(path).await {
                if let Some(id) = snapshot.aliases.get(alias) {
                    return id.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .ok()
}

#[tokio::test]
async fn background_task_flushes_without_explicit_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = PersistentRegistry::open(&path, Duration::from_millis(20))
        .await
        .unwrap();

    registry.insert_if_absent("pre-owned", "used.a.01").unwrap();

    assert_eq!(
        wait_for_alias(&path, "preowned").await.as_deref(),
        Some("used.a.01")
    );
}

#[tokio::test]
async fn bindings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");

    {
        let registry = PersistentRegistry::open(&path, Duration::from_secs(60))
            .await
            .unwrap();
        registry.insert_if_absent("notebook", "laptop.n.01").unwrap();
        registry
            .record_concept(
                "laptop.n.01",
                "laptop",
                &["type".to_string(), "computer.n.01".to_string(), "laptop.n.01".to_string()],
            )
            .unwrap();
        registry.flush().await.unwrap();
    }

    let reopened = PersistentRegistry::open(&path, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        reopened.lookup("Notebook").unwrap().as_deref(),
        Some("laptop.n.01")
    );
    // A reopened registry keeps first-writer-wins semantics for loaded aliases.
    assert_eq!(
        reopened.insert_if_absent("notebook", "notebook.n.01").unwrap(),
        "laptop.n.01"
    );
    assert_eq!(
        reopened.concept_path("laptop.n.01").unwrap().map(|p| p.len()),
        Some(3)
    );
}
