use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn concord(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("concord").expect("binary");
    cmd.current_dir(workdir)
        .env_remove("CONCORD_CONFIG")
        .arg("--quiet");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> (bool, Value) {
    let output = concord(workdir).args(args).output().expect("command run");
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    (output.status.success(), body)
}

fn write_config(root: &Path) {
    fs::write(
        root.join("concord.toml"),
        "schema_version = 1\n\n[registry]\npath = \"registry.json\"\nflush_interval_ms = 50\n",
    )
    .unwrap();
}

const BUYER: &str = r#"{
    "intent": "product",
    "subintent": "buy",
    "domain": ["electronics"],
    "items": [{
        "type": "smartphone",
        "categorical": {"condition": "2nd hand"},
        "max": {"cost": [{"type": "price", "value": "around 60k", "unit": "inr"}]}
    }]
}"#;

const SELLER: &str = r#"{
    "intent": "product",
    "subintent": "sell",
    "domain": ["Electronics"],
    "items": [{
        "type": "smart phone",
        "categorical": {"condition": "used"},
        "range": {"cost": [{"type": "price", "value": [58000, 58000], "unit": "rs"}]}
    }]
}"#;

const PRICEY_SELLER: &str = r#"{
    "intent": "product",
    "subintent": "sell",
    "domain": ["electronics"],
    "items": [{
        "type": "smartphone",
        "categorical": {"condition": "used"},
        "range": {"cost": [{"type": "price", "value": [90000, 90000], "unit": "inr"}]}
    }]
}"#;

#[test]
fn normalize_expands_abbreviations() {
    let temp = tempdir().unwrap();
    let (ok, body) = run_json(temp.path(), &["normalize", "2nd hand TV"]);
    assert!(ok);
    assert_eq!(body["normalized"], "second hand television");
    assert_eq!(body["compact"], "secondhandtelevision");
}

#[test]
fn resolve_prints_concept_node() {
    let temp = tempdir().unwrap();
    let (ok, body) = run_json(
        temp.path(),
        &["resolve", "Pre-Owned", "--key", "condition"],
    );
    assert!(ok, "{body}");
    assert_eq!(body["concept_id"], "used.a.01");
    assert_eq!(body["concept_path"][0], "condition");
}

#[test]
fn match_reports_the_failing_gate() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("buyer.json"), BUYER).unwrap();
    fs::write(root.join("seller.json"), SELLER).unwrap();
    fs::write(root.join("pricey.json"), PRICEY_SELLER).unwrap();

    let (ok, body) = run_json(root, &["match", "buyer.json", "seller.json"]);
    assert!(ok, "{body}");
    assert_eq!(body["matched"], true);

    let (ok, body) = run_json(root, &["match", "buyer.json", "pricey.json", "--explain"]);
    assert!(ok, "{body}");
    assert_eq!(body["matched"], false);
    assert_eq!(body["failed"], "items");
    assert!(body["reason"].as_str().unwrap().contains("items[0]"));
}

#[test]
fn find_returns_matching_file_stems() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("buyer.json"), BUYER).unwrap();
    fs::write(root.join("seller.json"), SELLER).unwrap();
    fs::write(root.join("pricey.json"), PRICEY_SELLER).unwrap();

    let (ok, body) = run_json(root, &["find", "buyer.json", "seller.json", "pricey.json"]);
    assert!(ok, "{body}");
    assert_eq!(body["matches"], serde_json::json!(["seller"]));
}

#[test]
fn malformed_listing_yields_error_envelope() {
    let temp = tempdir().unwrap();
    let draft = r#"{"intent":"product","subintent":"buy","domain":["books"],"items":[]}"#;
    let (ok, body) = run_json(temp.path(), &["ingest", draft]);
    assert!(!ok);
    assert_eq!(body["code"], "malformed_listing");
    assert!(body["hint"].as_str().unwrap().contains("items"));
}

#[test]
fn invalid_config_is_reported() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("bad.toml"), "[matching]\nmin_prefix = \"five\"\n").unwrap();
    let (ok, body) = run_json(root, &["--config", "bad.toml", "resolve", "dog"]);
    assert!(!ok);
    assert_eq!(body["code"], "config");
}

#[test]
fn bindings_survive_restart() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_config(root);

    let (ok, _) = run_json(
        root,
        &["--config", "concord.toml", "resolve", "Second-Hand", "--key", "condition"],
    );
    assert!(ok);
    assert!(root.join("registry.json").exists());

    let (ok, body) = run_json(
        root,
        &["--config", "concord.toml", "registry", "lookup", "second hand"],
    );
    assert!(ok, "{body}");
    assert_eq!(body["concept_id"], "used.a.01");
    assert_eq!(body["path"][0], "condition");
}

#[test]
fn schema_describes_listing() {
    let temp = tempdir().unwrap();
    concord(temp.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"subintent\""));
}
