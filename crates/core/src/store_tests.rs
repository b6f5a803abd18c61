// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the persistent store implementations.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::collections::BTreeMap;
use tempfile::tempdir;
use yare::parameterized;

fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("test_1_answers").unwrap(), None);

    store.set("test_1_answers", r#"{"1":"B"}"#).unwrap();
    store.set("test_1_time", "12").unwrap();
    assert_eq!(
        store.get("test_1_answers").unwrap().as_deref(),
        Some(r#"{"1":"B"}"#)
    );

    store.set("test_1_time", "13").unwrap();
    assert_eq!(store.get("test_1_time").unwrap().as_deref(), Some("13"));

    let mut keys = store.keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["test_1_answers", "test_1_time"]);

    store.remove("test_1_time").unwrap();
    store.remove("test_1_time").unwrap();
    assert_eq!(store.get("test_1_time").unwrap(), None);
    assert_eq!(store.keys().unwrap(), vec!["test_1_answers"]);
}

#[test]
fn memory_store_basic_operations() {
    exercise(&MemoryStore::new());
}

#[test]
fn file_store_basic_operations() {
    let dir = tempdir().unwrap();
    exercise(&FileStore::open(dir.path()).unwrap());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = FileStore::open(dir.path()).unwrap();
        store.set("test_42_selected", r#"{"2":["A","C"]}"#).unwrap();
    }
    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(
        store.get("test_42_selected").unwrap().as_deref(),
        Some(r#"{"2":["A","C"]}"#)
    );
}

#[test]
fn file_store_creates_missing_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = FileStore::open(&nested).unwrap();
    store.set("k", "1").unwrap();
    assert!(nested.join("k.json").exists());
}

#[test]
fn file_store_keys_ignore_foreign_files() {
    let dir = tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.set("kept", "1").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
    std::fs::write(dir.path().join("half.json.tmp"), "x").unwrap();

    assert_eq!(store.keys().unwrap(), vec!["kept"]);
}

#[parameterized(
    empty = { "" },
    hidden = { ".store" },
    slash = { "a/b" },
    parent = { "../up" },
    space = { "a b" },
)]
fn invalid_keys_are_rejected(key: &str) {
    let dir = tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    assert!(matches!(store.set(key, "1"), Err(StoreError::InvalidKey(_))));
    assert!(matches!(store.get(key), Err(StoreError::InvalidKey(_))));
}

#[parameterized(
    simple = { "materials_cache_topics" },
    dotted = { "materials_cache_result.7" },
    dashed = { "test_42-a_time" },
)]
fn valid_keys_are_accepted(key: &str) {
    assert!(validate_key(key).is_ok());
}

#[test]
fn json_helpers_roundtrip_and_report_corruption() {
    let store = MemoryStore::new();
    let mut answers = BTreeMap::new();
    answers.insert(1u64, "B".to_string());

    store.save_json("answers", &answers).unwrap();
    let loaded: Option<BTreeMap<u64, String>> = store.load_json("answers").unwrap();
    assert_eq!(loaded, Some(answers));

    let missing: Option<BTreeMap<u64, String>> = store.load_json("nothing").unwrap();
    assert_eq!(missing, None);

    store.set("answers", "{broken").unwrap();
    let err = store.load_json::<BTreeMap<u64, String>>("answers").unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}
