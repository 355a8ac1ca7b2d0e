//! Integration tests for the rowstore binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_collections_on_empty_store() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    Command::cargo_bin("rowstore")
        .unwrap()
        .args(["--store", temp.path().to_str().unwrap(), "collections"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No collections found"));
}

#[test]
fn test_get_missing_row_fails() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    Command::cargo_bin("rowstore")
        .unwrap()
        .args(["--store", temp.path().to_str().unwrap(), "get", "prospects", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_dump_lists_rows() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    {
        let mut store = rowstore::Store::open(temp.path()).unwrap();
        let doc = rowstore::Document {
            collection: "stages".to_string(),
            id: "s1".to_string(),
            updated_at: 1,
            data: serde_json::json!({"id": "s1", "name": "Lead"}),
            indexes: Default::default(),
        };
        store.insert_document(&doc).unwrap();
    }

    Command::cargo_bin("rowstore")
        .unwrap()
        .args(["--store", temp.path().to_str().unwrap(), "dump", "stages"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"Lead\""));
}
