use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gwk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gwk");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Site fixtures: one JSON array of records, one free-text note.
    let sites_dir = root.join("sites");
    fs::create_dir_all(&sites_dir).unwrap();
    fs::write(
        sites_dir.join("sites.json"),
        r#"[
  {
    "id": "site-001",
    "name": "Riverbend Wetland",
    "location": "North Basin",
    "description": "Degraded wetland along the river bend.",
    "currentIssues": ["erosion", "invasive reeds"],
    "suitableSolutions": ["native replanting", "bank stabilization"],
    "tags": ["wetland", "riparian"],
    "priority": "High",
    "area": 4.2
  },
  {
    "id": "site-002",
    "name": "Old Quarry",
    "location": "East Ridge",
    "description": "Abandoned quarry with exposed rock faces.",
    "currentIssues": ["runoff"],
    "suitableSolutions": ["terracing"],
    "tags": ["quarry"],
    "priority": "low",
    "area": 1.8
  }
]"#,
    )
    .unwrap();
    fs::write(
        sites_dir.join("survey-notes.txt"),
        "Field survey notes from the spring assessment.\nSoil samples pending.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/groundwork.sqlite"

[ingest]
root = "{root}/sites"
include_globs = ["**/*.json", "**/*.txt"]
exclude_globs = []
follow_symlinks = false

[retrieval]
top_k = 3

[embedding]
provider = "disabled"

[generation]
provider = "disabled"

[server]
bind = "127.0.0.1:8321"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("groundwork.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gwk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gwk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gwk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_gwk(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("groundwork.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_gwk(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_gwk(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_loads_site_records() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (stdout, stderr, success) = run_gwk(&config_path, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    // Two JSON records plus one text note.
    assert!(stdout.contains("items found: 3"), "got: {}", stdout);
    assert!(stdout.contains("upserted documents: 3"), "got: {}", stdout);
    // Embeddings are disabled, so everything stays pending.
    assert!(stdout.contains("embeddings pending: 3"), "got: {}", stdout);
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_idempotent_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (stdout1, _, _) = run_gwk(&config_path, &["ingest"]);
    assert!(stdout1.contains("upserted documents: 3"));

    // Unchanged records are deduplicated by content hash.
    let (stdout2, _, _) = run_gwk(&config_path, &["ingest"]);
    assert!(stdout2.contains("upserted documents: 0"), "got: {}", stdout2);
    assert!(stdout2.contains("unchanged: 3"), "got: {}", stdout2);
}

#[test]
fn test_ingest_dry_run() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (stdout, _, success) = run_gwk(&config_path, &["ingest", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("items found: 3"));
}

#[test]
fn test_ingest_with_limit() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (stdout, _, success) = run_gwk(&config_path, &["ingest", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("items found: 1"), "got: {}", stdout);
    assert!(stdout.contains("upserted documents: 1"), "got: {}", stdout);
}

#[test]
fn test_embed_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (_, stderr, success) = run_gwk(&config_path, &["embed"]);
    assert!(!success, "embed should fail when provider disabled");
    assert!(
        stderr.contains("disabled"),
        "Should mention disabled, got: {}",
        stderr
    );
}

#[test]
fn test_query_degrades_without_generation_backend() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    run_gwk(&config_path, &["ingest"]);

    let (stdout, stderr, success) = run_gwk(&config_path, &["query", "wetland erosion"]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("Summarization is not configured"),
        "Expected placeholder summary, got: {}",
        stdout
    );
}

#[test]
fn test_query_json_output() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (stdout, _, success) = run_gwk(&config_path, &["query", "anything", "--json"]);
    assert!(success);
    assert!(stdout.contains("\"summary\""));
    assert!(stdout.contains("\"results\""));
}

#[test]
fn test_query_empty_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    let (_, stderr, success) = run_gwk(&config_path, &["query", "   "]);
    assert!(!success, "Whitespace query should fail");
    assert!(
        stderr.contains("empty"),
        "Should mention empty query, got: {}",
        stderr
    );
}

#[test]
fn test_unknown_embedding_provider_rejected() {
    let (tmp, config_path) = setup_test_env();

    let bad = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"disabled\"", "provider = \"quantum\"");
    let bad_path = tmp.path().join("config").join("bad.toml");
    fs::write(&bad_path, bad).unwrap();

    let (_, stderr, success) = run_gwk(&bad_path, &["init"]);
    assert!(!success, "Unknown provider should fail config validation");
    assert!(
        stderr.contains("provider"),
        "Should mention provider, got: {}",
        stderr
    );
}

#[test]
fn test_missing_config_errors() {
    let (tmp, _config_path) = setup_test_env();

    let missing = tmp.path().join("config").join("nope.toml");
    let (_, stderr, success) = run_gwk(&missing, &["init"]);
    assert!(!success, "Missing config should fail");
    assert!(!stderr.is_empty());
}

#[test]
fn test_status_counts() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    run_gwk(&config_path, &["ingest"]);

    let (stdout, _, success) = run_gwk(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("documents: 3"), "got: {}", stdout);
    assert!(stdout.contains("vectors: 0"), "got: {}", stdout);
}

#[test]
fn test_deterministic_query_results() {
    let (_tmp, config_path) = setup_test_env();

    run_gwk(&config_path, &["init"]);
    run_gwk(&config_path, &["ingest"]);

    let (stdout1, _, _) = run_gwk(&config_path, &["query", "restoration", "--json"]);
    let (stdout2, _, _) = run_gwk(&config_path, &["query", "restoration", "--json"]);
    assert_eq!(stdout1, stdout2, "Query output should be deterministic");
}
