use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ume_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ume");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("card.md"),
        "# 知的生産の技術\n\nカードに書く。並べ替える。\n\n## Method\n\nWrite one idea per card. Shuffle them later!",
    )
    .unwrap();
    fs::write(files_dir.join("photo.jpg"), [0xff, 0xd8, 0xff, 0xe0]).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/ume.sqlite"

[storage]
backend = "fs"
root = "{root}/data/blobs"

[embedding]
provider = "disabled"

[extraction]
poll_interval_secs = 0
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ume.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ume(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ume_binary();
    let workdir = config_path.parent().unwrap().parent().unwrap();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(workdir)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG");
    for var in [
        "OPENAI_KEY",
        "AZURE_ENDPOINT",
        "AZURE_KEY",
        "MISTRAL_KEY",
        "MINIO_USER",
        "MINIO_PASSWORD",
    ] {
        cmd.env_remove(var);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ume binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, success) = run_ume(&config, &["init"]);
    assert!(success);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/ume.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, first) = run_ume(&config, &["init"]);
    let (_, stderr, second) = run_ume(&config, &["init"]);
    assert!(first);
    assert!(second, "second init failed: {}", stderr);
}

#[test]
fn test_chunk_preview_structural() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files/card.md");
    let (stdout, _, success) = run_ume(&config, &["chunk", file.to_str().unwrap()]);
    assert!(success);
    // whole card + 2 headings + 4 sentences
    assert!(stdout.starts_with("7 chunks (structural chunking)"), "{}", stdout);
    assert!(stdout.contains("[2] 6 chars\nカードに書く\n"), "{}", stdout);
    assert!(stdout.contains("[6] 18 chars\nShuffle them later\n"), "{}", stdout);
}

#[test]
fn test_chunk_preview_flat() {
    let (tmp, config) = setup_test_env();
    let file = tmp.path().join("files/card.md");
    let (stdout, _, success) = run_ume(
        &config,
        &["chunk", file.to_str().unwrap(), "--method", "flat"],
    );
    assert!(success);
    assert!(stdout.contains("(flat chunking)"));
}

#[test]
fn test_chunk_needs_no_config() {
    let (tmp, _) = setup_test_env();
    let file = tmp.path().join("files/card.md");
    let missing = tmp.path().join("config/missing.toml");
    let (_, stderr, success) = run_ume(&missing, &["chunk", file.to_str().unwrap()]);
    assert!(success, "{}", stderr);
}

#[test]
fn test_lookup_empty_corpus() {
    let (_tmp, config) = setup_test_env();
    run_ume(&config, &["init"]);
    let (_, stderr, success) = run_ume(&config, &["lookup", "idea cards"]);
    assert!(!success);
    assert!(stderr.contains("no searchable chunks"), "{}", stderr);
}

#[test]
fn test_lookup_unknown_policy() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ume(&config, &["lookup", "x", "--policy", "best"]);
    assert!(!success);
    assert!(stderr.contains("unknown ranking policy"), "{}", stderr);
}

#[test]
fn test_delete_missing_card() {
    let (_tmp, config) = setup_test_env();
    run_ume(&config, &["init"]);
    let (_, stderr, success) = run_ume(&config, &["delete", "99", "--yes"]);
    assert!(!success);
    assert!(stderr.contains("card not found: 99"), "{}", stderr);
}

#[test]
fn test_delete_without_yes_when_not_a_tty() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ume(&config, &["delete", "1"]);
    assert!(!success);
    assert!(stderr.contains("--yes"), "{}", stderr);
}

#[test]
fn test_show_missing_card() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_ume(&config, &["show", "7"]);
    assert!(!success);
    assert!(stderr.contains("markdown not found"), "{}", stderr);
}

#[test]
fn test_invalid_card_id() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_ume(&config, &["show", "seven"]);
    assert!(!success);
}

#[test]
fn test_upload_without_credentials_stores_nothing() {
    let (tmp, config) = setup_test_env();
    let photo = tmp.path().join("files/photo.jpg");
    let (_, stderr, success) = run_ume(
        &config,
        &["upload", photo.to_str().unwrap(), "--method", "vision"],
    );
    assert!(!success);
    assert!(stderr.contains("OPENAI_KEY"), "{}", stderr);

    let (stdout, _, _) = run_ume(&config, &["stats"]);
    assert!(stdout.contains("Cards:       0"), "{}", stdout);
}

#[test]
fn test_upload_unknown_method() {
    let (tmp, config) = setup_test_env();
    let photo = tmp.path().join("files/photo.jpg");
    let (_, _, success) = run_ume(
        &config,
        &["upload", photo.to_str().unwrap(), "--method", "tesseract"],
    );
    assert!(!success);
}

#[test]
fn test_stats_on_fresh_database() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_ume(&config, &["stats"]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("Chunks:      0"));
    assert!(stdout.contains("Last edit:   never"));
}

#[test]
fn test_bad_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[db]\npath = \"x.sqlite\"\n\n[retrieval]\ntop_k = 0\n",
    )
    .unwrap();
    let (_, stderr, success) = run_ume(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("top_k"), "{}", stderr);
}

#[test]
fn test_completions() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_ume(&config, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("ume"));
}
