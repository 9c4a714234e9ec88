//! Configuration loading from files and environment sources

use std::collections::HashMap;
use std::fs;

use data_pipeline::{ConfigurationError, LoaderType, PipelineConfig};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_env_file_with_database_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.env");
    fs::write(
        &path,
        "PIPELINE_NAME=nightly\n\
         CSV_DELIMITER=;\n\
         CSV_SKIP_ROWS=1\n\
         TRANSFORMER_LOG_DETAILS=FALSE\n\
         MYSQL_IF_EXISTS=replace\n\
         DB_HOST=db.internal\n\
         DB_PORT=3307\n\
         DB_USER=etl\n\
         DB_PASSWORD=s3cret\n\
         DB_NAME=warehouse\n",
    )
    .unwrap();

    let config = PipelineConfig::from_env_file(&path).unwrap();
    assert_eq!(config.name, "nightly");
    assert_eq!(config.loader.kind, LoaderType::Mysql);

    let extractor = config.extractor_config();
    assert_eq!(extractor["type"], json!("csv"));
    assert_eq!(extractor["delimiter"], json!(";"));
    assert_eq!(extractor["skip_rows"], json!(1));
    assert_eq!(config.transformer_config()["log_details"], json!(false));
    assert_eq!(config.loader_config()["if_exists"], json!("replace"));

    let database = config.database_config().unwrap();
    assert_eq!(database["port"], json!(3307));
    assert_eq!(database["charset"], json!("utf8mb4"));
    assert!(!format!("{:?}", config.database.as_ref().unwrap()).contains("s3cret"));
}

#[test]
fn test_partial_database_keys_leave_section_unset() {
    let vars: HashMap<&str, &str> = [("DB_HOST", "localhost"), ("DB_PORT", "3306"), ("DB_USER", "root")]
        .into_iter()
        .collect();
    let config = PipelineConfig::from_env_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    assert!(config.database.is_none());
    assert!(config.database_config().is_none());
}

#[test]
fn test_env_port_out_of_range() {
    let vars: HashMap<&str, &str> = [
        ("DB_HOST", "localhost"),
        ("DB_PORT", "70000"),
        ("DB_USER", "root"),
        ("DB_PASSWORD", "pw"),
        ("DB_NAME", "shop"),
    ]
    .into_iter()
    .collect();
    let err = PipelineConfig::from_env_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap_err();
    assert!(matches!(err, ConfigurationError::OutOfRange { .. }));
}

#[test]
fn test_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.yaml");
    fs::write(
        &path,
        r#"
name: yaml_pipeline
description: loads users
extractor:
  type: CSV
  config:
    encoding: latin-1
transformer:
  type: passthrough
loader:
  type: duckdb
  config:
    if_exists: replace
"#,
    )
    .unwrap();

    let config = PipelineConfig::from_file(&path).unwrap();
    assert_eq!(config.description, "loads users");
    assert_eq!(config.loader.kind, LoaderType::Duckdb);
    assert_eq!(
        config.to_string(),
        "Config(name=yaml_pipeline, extractor=csv, transformer=passthrough, loader=duckdb)"
    );
}

#[test]
fn test_unknown_extension_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.ini");
    fs::write(&path, "name=x").unwrap();
    assert!(matches!(
        PipelineConfig::from_file(&path),
        Err(ConfigurationError::UnsupportedFileType(_))
    ));
}

#[test]
fn test_blank_name_rejected_on_every_path() {
    let err = PipelineConfig::from_value(json!({
        "name": "   ",
        "extractor": {"type": "csv"},
        "transformer": {"type": "passthrough"},
        "loader": {"type": "mysql"}
    }))
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::Empty(_)));

    let err = PipelineConfig::from_env_lookup(|key| (key == "PIPELINE_NAME").then(|| " \t".to_string()))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Empty(_)));
}
