/*!
 * Tests for the JSON batch store
 */

use gapfill::errors::StoreError;
use gapfill::session::{BatchStore, JsonBatchStore, RunManifest};
use gapfill::translation::{BatchResult, TranslatedRecord};
use std::fs;

use crate::common;

fn result(sequence: u64, pass: u32, ids: &[u64]) -> BatchResult {
    BatchResult {
        sequence,
        pass,
        entries: ids.iter().map(|id| TranslatedRecord::new(*id, format!("t{}", id))).collect(),
    }
}

#[test]
fn test_persist_shouldWriteOneFilePerBatch() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path().join("batches"));

    store.persist(&result(1, 1, &[1, 2])).unwrap();
    store.persist(&result(2, 1, &[])).unwrap();

    assert!(store.batch_path(1).exists());
    assert!(store.batch_path(2).exists());
    assert!(store.batch_path(1).ends_with("batch_1.json"));

    let content = fs::read_to_string(store.batch_path(1)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["entries"][1]["id"], 2);
    assert_eq!(value["entries"][1]["translated_text"], "t2");
}

#[test]
fn test_loadAll_shouldOrderBySequenceNumerically() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());

    for sequence in [10, 2, 1] {
        store.persist(&result(sequence, 1, &[sequence])).unwrap();
    }
    common::create_test_file(&temp_dir.path().to_path_buf(), "notes.json", "{}").unwrap();

    let sequences: Vec<u64> = store.load_all().unwrap().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 10]);
}

#[test]
fn test_loadAll_withCorruptFile_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());
    common::create_test_file(&temp_dir.path().to_path_buf(), "batch_1.json", "{ not json").unwrap();

    assert!(matches!(store.load_all(), Err(StoreError::Json { .. })));
}

#[test]
fn test_loadAll_withMissingDirectory_shouldBeEmpty() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path().join("never_created"));
    assert!(store.load_all().unwrap().is_empty());
}

#[test]
fn test_startFresh_withExistingBatches_shouldRequireForce() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());
    let manifest = RunManifest::new("fp", "French", 2);
    store.persist(&result(1, 1, &[1])).unwrap();

    let err = store.start_fresh(&manifest, false).unwrap_err();
    assert!(matches!(err, StoreError::ExistingBatches(_)));
    assert!(store.batch_path(1).exists());

    store.start_fresh(&manifest, true).unwrap();
    assert!(store.load_all().unwrap().is_empty());
    assert_eq!(store.read_manifest().unwrap(), Some(manifest));
}

#[test]
fn test_openForResume_withMatchingManifest_shouldKeepOriginalRun() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());
    let original = RunManifest::new("fp", "French", 2);
    store.start_fresh(&original, false).unwrap();

    let reopened = store.open_for_resume(&RunManifest::new("fp", "french", 2)).unwrap();

    assert_eq!(reopened.run_id, original.run_id);
}

#[test]
fn test_openForResume_withDifferentInput_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());
    store.start_fresh(&RunManifest::new("fp", "French", 2), false).unwrap();

    let other_input = store.open_for_resume(&RunManifest::new("other", "French", 2));
    assert!(matches!(other_input, Err(StoreError::ManifestMismatch { .. })));

    let other_language = store.open_for_resume(&RunManifest::new("fp", "German", 2));
    assert!(matches!(other_language, Err(StoreError::ManifestMismatch { .. })));
}

#[test]
fn test_openForResume_withBatchesButNoManifest_shouldFail() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path());
    store.persist(&result(1, 1, &[1])).unwrap();

    let err = store.open_for_resume(&RunManifest::new("fp", "French", 1)).unwrap_err();
    assert!(matches!(err, StoreError::ManifestMismatch { .. }));
}

#[test]
fn test_openForResume_withEmptyDirectory_shouldInitialiseManifest() {
    let temp_dir = common::create_temp_dir().unwrap();
    let store = JsonBatchStore::new(temp_dir.path().join("fresh"));
    let manifest = RunManifest::new("fp", "French", 1);

    let opened = store.open_for_resume(&manifest).unwrap();

    assert_eq!(opened, manifest);
    assert!(store.manifest_path().exists());
}
