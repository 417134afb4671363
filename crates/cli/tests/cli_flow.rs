use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn devagent(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("devagent").expect("binary");
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = devagent(workdir)
        .arg("--json")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_repo() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(
        root.join("src/calc.py"),
        "def add(a, b):\n    return a + b\n\n\ndef mul(a, b):\n    return a * b\n",
    )
    .unwrap();
    fs::write(root.join("README.md"), "# not indexed\n").unwrap();
    temp
}

#[test]
fn index_then_query_returns_ranked_chunks() {
    let temp = setup_repo();
    let root = temp.path();

    let report = run_json(root, &["index"]);
    assert_eq!(report["files_indexed"], 1);
    assert!(report["chunks_indexed"].as_u64().unwrap() >= 3);
    assert!(root.join(".devagent/index/index.json").exists());
    assert!(root.join(".devagent/index/file_hashes.json").exists());

    let hits = run_json(root, &["query", "add a b", "-k", "2", "--type", "function"]);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    for hit in hits {
        assert_eq!(hit["chunk"]["chunk_type"], "function");
        assert!(hit["chunk"].get("embedding").is_none());
        assert!(hit["score"].is_number());
    }
}

#[test]
fn stats_and_files_reflect_the_index() {
    let temp = setup_repo();
    let root = temp.path();
    run_json(root, &["index"]);

    let stats = run_json(root, &["stats"]);
    assert_eq!(stats["indexed_files"], 1);
    assert_eq!(stats["model_id"], "hashing-v1-384");
    assert_eq!(stats["index"]["total_files"], 1);

    let files = run_json(root, &["files"]);
    assert_eq!(files, serde_json::json!(["src/calc.py"]));
}

#[test]
fn function_and_file_context() {
    let temp = setup_repo();
    let root = temp.path();
    run_json(root, &["index"]);

    let hits = run_json(root, &["function", "src/calc.py", "mul", "-k", "1"]);
    assert_eq!(hits[0]["chunk"]["metadata"]["name"], "mul");

    let chunks = run_json(root, &["file", "src/calc.py"]);
    let types: Vec<_> = chunks
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["chunk_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["function", "function", "file"]);
}

#[test]
fn update_picks_up_edits() {
    let temp = setup_repo();
    let root = temp.path();
    run_json(root, &["index"]);

    let report = run_json(root, &["update"]);
    assert_eq!(report["files_indexed"], 0);

    fs::write(root.join("src/calc.py"), "def sub(a, b):\n    return a - b\n").unwrap();
    let report = run_json(root, &["update", "src/calc.py"]);
    assert_eq!(report["files_indexed"], 1);

    let chunks = run_json(root, &["file", "src/calc.py"]);
    assert_eq!(chunks[0]["metadata"]["name"], "sub");
}

#[test]
fn human_output_goes_to_stdout_and_stderr() {
    let temp = setup_repo();
    let root = temp.path();

    devagent(root)
        .arg("index")
        .assert()
        .success()
        .stderr(predicate::str::contains("Indexed 1 files"));

    devagent(root)
        .args(["query", "multiply", "--type", "function"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/calc.py"));
}

#[test]
fn malformed_config_is_an_error() {
    let temp = setup_repo();
    let root = temp.path();
    fs::create_dir_all(root.join(".devagent")).unwrap();
    fs::write(root.join(".devagent/config.toml"), "[indexing\nchunk_size = 10\n").unwrap();

    devagent(root)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn explicit_config_changes_the_provider() {
    let temp = setup_repo();
    let root = temp.path();
    let config = root.join("devagent.toml");
    fs::write(&config, "[embedding]\ndimension = 32\n").unwrap();

    let stats = run_json(root, &["--config", config.to_str().unwrap(), "stats"]);
    assert_eq!(stats["dimension"], 32);
    assert_eq!(stats["model_id"], "hashing-v1-32");
}
