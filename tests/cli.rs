use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

mod common;

use common::{archive_from_lines, archive_of};

/// Lays out a local mirror the CLI can read through a file:// base URL.
fn write_mirror(root: &Path) -> String {
    let mirror = root.join("mirror");
    fs::create_dir_all(&mirror).expect("create mirror");

    let plwiki = archive_of(12);
    let forum = archive_from_lines(&[
        json!({"text": "o sporcie", "meta": {"category": {"Sport": 0.99}}}).to_string(),
        "garbage".to_string(),
        json!({"text": "o polityce", "meta": {"category": {"Polityka": 0.97}}}).to_string(),
    ]);

    let catalog = json!([
        {
            "name": "plwiki",
            "file_size": plwiki.len(),
            "stats": {"documents": 12, "characters": 204, "words": 36, "quality": {"HIGH": 0.9}},
            "license": "CC-BY-SA",
            "description": "Polish Wikipedia"
        },
        {
            "name": "forum",
            "file_size": forum.len(),
            "stats": {"documents": 3, "characters": 30}
        }
    ]);

    fs::write(mirror.join("speakleash.json"), catalog.to_string()).expect("write catalog");
    fs::write(mirror.join("plwiki.jsonl.zst"), plwiki).expect("write plwiki");
    fs::write(mirror.join("forum.jsonl.zst"), forum).expect("write forum");
    fs::write(mirror.join("plwiki.sample"), r#"["próbka"]"#).expect("write sample");

    url::Url::from_directory_path(&mirror)
        .expect("mirror url")
        .to_string()
}

fn speakleash(root: &Path, base_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("speakleash").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("SPEAKLEASH_CONFIG")
        .env_remove("SPEAKLEASH_LANG")
        .arg("--dir")
        .arg(root.join("replicate"))
        .arg("--base-url")
        .arg(base_url);
    cmd
}

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("speakleash").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("speakleash").unwrap();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(format!("speakleash {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_shows_catalog() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("plwiki"))
        .stdout(predicates::str::contains("forum"))
        .stdout(predicates::str::contains("2 dataset(s) for language 'pl'"));
}

#[test]
fn list_json_output() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["list", "--output", "json"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"name\":\"plwiki\""))
        .stdout(predicates::str::contains("\"documents\":12"));
}

#[test]
fn info_prints_manifest_fields() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["info", "plwiki"])
        .assert()
        .success()
        .stdout(predicates::str::contains("documents:    12"))
        .stdout(predicates::str::contains("quality:      HIGH"))
        .stdout(predicates::str::contains("license:      CC-BY-SA"))
        .stdout(predicates::str::contains("replicated:   false"));
}

#[test]
fn info_unknown_dataset_fails() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["info", "missing_name"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Dataset not found: 'missing_name'"));
}

#[test]
fn unreachable_catalog_fails() {
    let root = tempfile::tempdir().expect("tempdir");
    let empty = url::Url::from_directory_path(root.path())
        .expect("url")
        .to_string();

    speakleash(root.path(), &empty)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicates::str::contains("Manifest for language 'pl' is unavailable"));
}

#[test]
fn replicate_then_stream() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["replicate", "plwiki"])
        .assert()
        .success()
        .stdout(predicates::str::contains("plwiki.jsonl.zst"));
    assert!(root.path().join("replicate/plwiki.jsonl.zst").is_file());

    speakleash(root.path(), &base)
        .args(["stream", "plwiki", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Dokument numer 1."))
        .stdout(predicates::str::contains("Dokument numer 2.").not());
}

#[test]
fn stream_reports_skipped_records() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["stream", "forum", "--meta"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"meta\""))
        .stderr(predicates::str::contains("2 document(s) streamed, 1 malformed record(s) skipped"));
}

#[test]
fn strict_stream_fails_on_garbage() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["stream", "forum", "--strict"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Malformed record in dataset 'forum' at line 2"));
}

#[test]
fn limit_stops_before_reading_further_records() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    // Line 2 of forum is garbage; a limit of 1 must never reach it.
    speakleash(root.path(), &base)
        .args(["stream", "forum", "--strict", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicates::str::contains("o sporcie"))
        .stderr(predicates::str::contains("1 document(s) streamed"))
        .stderr(predicates::str::contains("skipped").not());

    speakleash(root.path(), &base)
        .args(["stream", "forum", "--strict", "--limit", "0"])
        .assert()
        .success()
        .stdout("")
        .stderr(predicates::str::contains("0 document(s) streamed"));
}

#[test]
fn stream_filters_by_category() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["stream", "forum", "--category", "sport"])
        .assert()
        .success()
        .stdout(predicates::str::contains("o sporcie"))
        .stdout(predicates::str::contains("o polityce").not());
}

#[test]
fn samples_and_remove() {
    let root = tempfile::tempdir().expect("tempdir");
    let base = write_mirror(root.path());

    speakleash(root.path(), &base)
        .args(["samples", "plwiki"])
        .assert()
        .success()
        .stdout(predicates::str::contains("próbka"));

    speakleash(root.path(), &base)
        .args(["sample", "plwiki", "-n", "3", "--seed", "1"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Dokument numer"));

    speakleash(root.path(), &base)
        .args(["remove", "plwiki"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Removed local archive of 'plwiki'"));
    assert!(!root.path().join("replicate/plwiki.jsonl.zst").exists());
}
