//! CSV extraction scenarios

use std::fs;

use data_pipeline::{CsvExtractor, ExtractionErrorKind, Extractor, StageOptions, Value};
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &[u8]) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn params(value: serde_json::Value) -> StageOptions {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_row_count_matches_data_rows() {
    let dir = TempDir::new().unwrap();
    let body: String = (1..=25).map(|i| format!("{i},name_{i}\n")).collect();
    let source = write(&dir, "ids.csv", format!("id,name\n{body}").as_bytes());

    let data = CsvExtractor::with_defaults()
        .extract(&source, &StageOptions::new())
        .unwrap();
    assert_eq!(data.num_rows(), 25);
    assert_eq!(data.column_names(), vec!["id", "name"]);
}

#[test]
fn test_skip_rows_promotes_first_data_row_to_header() {
    let dir = TempDir::new().unwrap();
    let source = write(&dir, "users.csv", b"id,name,age\n1,John,25\n2,Jane,30\n3,Bob,35\n");

    let data = CsvExtractor::with_defaults()
        .extract(&source, &params(json!({"skip_rows": 1})))
        .unwrap();
    assert_eq!(data.num_rows(), 2);
    assert_eq!(data.column_names(), vec!["1", "John", "25"]);
    assert_eq!(data.column("John").unwrap().values[0], Value::from("Jane"));
}

#[test]
fn test_zero_byte_file_is_empty_content() {
    let dir = TempDir::new().unwrap();
    let source = write(&dir, "empty.csv", b"");

    let err = CsvExtractor::with_defaults()
        .extract(&source, &StageOptions::new())
        .unwrap_err();
    assert_eq!(err.kind(), ExtractionErrorKind::EmptyContent);
    assert!(err.to_string().starts_with("CSV file is empty"));
}

#[test]
fn test_max_rows_keeps_file_order() {
    let dir = TempDir::new().unwrap();
    let source = write(&dir, "users.csv", b"id,name\n1,John\n2,Jane\n3,Bob\n");
    let extractor = CsvExtractor::new(params(json!({"max_rows": 2}))).unwrap();

    let data = extractor.extract(&source, &StageOptions::new()).unwrap();
    assert_eq!(data.num_rows(), 2);
    assert_eq!(
        data.column("name").unwrap().values,
        vec![Value::from("John"), Value::from("Jane")]
    );
}

#[test]
fn test_failure_kinds_are_distinct() {
    let dir = TempDir::new().unwrap();
    let extractor = CsvExtractor::with_defaults();
    let missing = dir.path().join("missing.csv");
    let quoted = write(&dir, "quoted.csv", b"a,b\n\"open,1\n");
    let latin = write(&dir, "latin.csv", b"name\nJos\xe9\n");

    let kinds = [
        extractor.extract(&missing.to_string_lossy(), &StageOptions::new()),
        extractor.extract(&dir.path().to_string_lossy(), &StageOptions::new()),
        extractor.extract(&quoted, &StageOptions::new()),
        extractor.extract(&latin, &StageOptions::new()),
        extractor.extract("  ", &StageOptions::new()),
    ]
    .into_iter()
    .map(|result| result.unwrap_err().kind())
    .collect::<Vec<_>>();

    assert_eq!(
        kinds,
        vec![
            ExtractionErrorKind::FileNotFound,
            ExtractionErrorKind::NotAFile,
            ExtractionErrorKind::Malformed,
            ExtractionErrorKind::Decode,
            ExtractionErrorKind::InvalidSource,
        ]
    );

    let data = extractor
        .extract(&latin, &params(json!({"encoding": "latin-1"})))
        .unwrap();
    assert_eq!(data.column("name").unwrap().values[0], Value::from("José"));
}

#[test]
fn test_metadata_is_best_effort() {
    let dir = TempDir::new().unwrap();
    let source = write(&dir, "users.csv", b"id\n1\n");
    let extractor = CsvExtractor::with_defaults();

    let metadata = extractor.metadata(&source);
    assert_eq!(metadata["file_size_bytes"], json!(5));
    assert!(metadata.contains_key("file_modified"));

    let metadata = extractor.metadata("missing.csv");
    assert_eq!(metadata["extractor_type"], json!("csv"));
    assert!(!metadata.contains_key("file_size_bytes"));
}
