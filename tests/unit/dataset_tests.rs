/*!
 * Tests for dataset loading
 */

use gapfill::dataset::{RecordPayload, SourceSet};
use gapfill::errors::DatasetError;

use crate::common;

#[test]
fn test_load_withHadithCollection_shouldKeepSourceOrder() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_dataset(&temp_dir.path().to_path_buf(), "collection.json", &[5, 1, 3]).unwrap();

    let source = SourceSet::load(&path, None).unwrap();

    let ids: Vec<u64> = source.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![5, 1, 3]);
    assert_eq!(source.position(3), Some(2));
    assert!(matches!(source.records()[0].payload, RecordPayload::Structured(_)));
}

#[test]
fn test_load_withRecordsKey_shouldUseNamedArray() {
    let temp_dir = common::create_temp_dir().unwrap();
    let content = r#"{"chapters": [1, 2], "hadiths": [{"id": 1, "text": "a"}, {"id": 2, "text": "b"}]}"#;
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "data.json", content).unwrap();

    assert!(matches!(SourceSet::load(&path, None), Err(DatasetError::NoRecords(_))));

    let source = SourceSet::load(&path, Some("hadiths")).unwrap();
    assert_eq!(source.len(), 2);
    assert!(source.contains(2));
}

#[test]
fn test_load_withMissingFile_shouldReportPath() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("absent.json");

    let err = SourceSet::load(&path, None).unwrap_err();

    assert!(matches!(err, DatasetError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_fromJsonStr_withEmptyText_shouldFail() {
    let err = SourceSet::from_json_str(r#"[{"id": 9, "text": "   "}]"#, None).unwrap_err();
    assert!(matches!(err, DatasetError::EmptyPayload(9)));
}

#[test]
fn test_fromJsonStr_withNoRecords_shouldFail() {
    assert!(matches!(
        SourceSet::from_json_str("[]", None),
        Err(DatasetError::NoRecords(_))
    ));
    assert!(matches!(
        SourceSet::from_json_str(r#"{"collection": "bukhari", "hadiths": []}"#, None),
        Err(DatasetError::NoRecords(_))
    ));
    assert!(matches!(SourceSet::new(Vec::new()), Err(DatasetError::NoRecords(_))));
}

#[test]
fn test_fromJsonStr_withNonObjectRecord_shouldFail() {
    let err = SourceSet::from_json_str(r#"[{"id": 1, "text": "a"}, "oops"]"#, None).unwrap_err();
    assert!(matches!(err, DatasetError::NotAnObject { index: 1 }));
}

#[test]
fn test_fingerprint_shouldDependOnRecordOrder() {
    let forward = common::source_with_ids([1, 2, 3]);
    let backward = common::source_with_ids([3, 2, 1]);
    assert_ne!(forward.fingerprint(), backward.fingerprint());
}
