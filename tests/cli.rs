//! Integration tests for top-level CLI behavior.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use autonum::adapters::live::filesystem::LiveFileSystem;
use autonum::adapters::live::id_gen::UuidIdGenerator;
use autonum::model::{NumberingConfig, Record, Value};
use autonum::ports::RecordStore;
use autonum::store::FileStore;

fn run_autonum(store: &Path, args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_autonum");
    Command::new(bin)
        .arg("--store")
        .arg(store)
        .args(args)
        .env_remove("AUTONUM_STORE")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run autonum binary")
}

fn temp_store(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("autonum-cli-{name}-{}", uuid::Uuid::new_v4()))
}

fn seeded_store(name: &str) -> (PathBuf, FileStore) {
    let root = temp_store(name);
    let store = FileStore::new(&root, Arc::new(LiveFileSystem), Arc::new(UuidIdGenerator));
    store
        .put_config(&NumberingConfig {
            id: "inv".into(),
            name: "Invoices".into(),
            format: Some("INV-{$region}-{sequence}".into()),
            field: Some("number".into()),
            entity: Some("invoice".into()),
            current_index: Some(9),
            index_padding: Some(3),
            random_letter_start: Some(false),
            ..NumberingConfig::default()
        })
        .unwrap();
    store.put_record(&Record::new("invoice", "i1").with("region", "EU")).unwrap();
    store.put_record(&Record::new("invoice", "i2").with("region", "US")).unwrap();
    (root, store)
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn help_lists_subcommands() {
    let output = run_autonum(&temp_store("help"), &["--help"]);
    let stdout = stdout(&output);
    assert!(output.status.success());
    for command in ["generate", "inline", "preview", "show", "streams", "backlog"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn show_on_empty_store() {
    let output = run_autonum(&temp_store("empty"), &["show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No configs found"));
}

#[test]
fn generate_writes_number_and_advances_counter() {
    let (root, store) = seeded_store("generate");

    let output = run_autonum(&root, &["generate", "Invoices", "--entity", "invoice", "--id", "i1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output).trim(), "INV-EU-010");

    let record = store.get("invoice", "i1", None).unwrap();
    assert_eq!(record.get("number"), Some(&Value::from("INV-EU-010")));
    let output = run_autonum(&root, &["--json", "show", "inv"]);
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["current_index"], 10);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn generate_twice_skips_numbered_record() {
    let (root, _store) = seeded_store("skip");
    run_autonum(&root, &["generate", "inv", "--entity", "invoice", "--id", "i1"]);

    let output = run_autonum(&root, &["--json", "generate", "inv", "--entity", "invoice", "--id", "i1"]);
    assert!(output.status.success());
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["outcome"], "skipped");
    assert_eq!(outcome["reason"], "already_numbering");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn preview_does_not_persist() {
    let (root, store) = seeded_store("preview");

    for _ in 0..2 {
        let output = run_autonum(&root, &["preview", "inv", "--entity", "invoice", "--id", "i2"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(stdout(&output).trim(), "INV-US-010");
    }
    assert!(store.get("invoice", "i2", None).unwrap().get("number").is_none());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn inline_prints_without_a_target() {
    let output = run_autonum(&temp_store("inline"), &["inline", "TMP-{param:1}-{!n-4};;code;;false", "--param", "A"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let printed = stdout(&output);
    let printed = printed.trim();
    assert!(printed.starts_with("TMP-A-"));
    assert_eq!(printed.len(), "TMP-A-".len() + 4);
}

#[test]
fn backlog_reservation_is_claimed_by_trigger() {
    let (root, store) = seeded_store("backlog");

    let output = run_autonum(&root, &["--json", "backlog", "allocate", "inv", "t1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let entry: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(entry["index"], 10);

    run_autonum(&root, &["generate", "inv", "--entity", "invoice", "--id", "i1"]);
    let output = run_autonum(&root, &["generate", "--trigger", "t1", "--entity", "invoice", "--id", "i2"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output).trim(), "INV-US-010");
    assert_eq!(store.get("invoice", "i1", None).unwrap().get("number"), Some(&Value::from("INV-EU-011")));

    let again = run_autonum(&root, &["generate", "--trigger", "t1", "--entity", "invoice", "--id", "i2"]);
    assert!(!again.status.success());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unknown_config_fails() {
    let output = run_autonum(&temp_store("unknown"), &["generate", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no active config"));
}
