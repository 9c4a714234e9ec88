//! Environment variable configuration source

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Value as JsonValue, json};
use tracing::info;

use super::error::ConfigurationError;
use super::stage::{LoaderType, StageOptions};

/// Database keys that must all be set for the database section to exist
pub const DATABASE_ENV_KEYS: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"];

/// Read `.env` entries without touching the process environment
pub(crate) fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigurationError> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| match e {
        dotenvy::Error::Io(source) => ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => ConfigurationError::Parse(other.to_string()),
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        vars.insert(key, value);
    }
    info!(path = %path.display(), keys = vars.len(), "Read .env file");
    Ok(vars)
}

/// Build the structured configuration document from environment lookups
///
/// Unset and empty variables are treated alike.
pub(crate) fn document_from_lookup<F>(lookup: F) -> Result<JsonValue, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let loader_type = get("LOADER_TYPE").unwrap_or_else(|| "mysql".to_string());

    let mut extractor = StageOptions::new();
    if let Some(encoding) = get("CSV_ENCODING") {
        extractor.insert("encoding".into(), json!(encoding));
    }
    if let Some(delimiter) = get("CSV_DELIMITER") {
        extractor.insert("delimiter".into(), json!(delimiter));
    }
    if let Some(skip) = get("CSV_SKIP_ROWS") {
        extractor.insert("skip_rows".into(), json!(parse_count("CSV_SKIP_ROWS", &skip)?));
    }
    if let Some(max) = get("CSV_MAX_ROWS") {
        extractor.insert("max_rows".into(), json!(parse_count("CSV_MAX_ROWS", &max)?));
    }

    let mut transformer = StageOptions::new();
    if let Some(details) = get("TRANSFORMER_LOG_DETAILS") {
        transformer.insert(
            "log_details".into(),
            json!(details.eq_ignore_ascii_case("true")),
        );
    }

    let mut loader = StageOptions::new();
    if let Some(policy) = get("MYSQL_IF_EXISTS") {
        loader.insert("if_exists".into(), json!(policy));
    }
    let is_mysql = loader_type.trim().eq_ignore_ascii_case(LoaderType::Mysql.name());
    if is_mysql {
        if let Some(charset) = get("MYSQL_CHARSET") {
            loader.insert("charset".into(), json!(charset));
        }
    } else if let Some(path) = get("DUCKDB_PATH") {
        loader.insert("path".into(), json!(path));
    }

    let mut document = json!({
        "name": get("PIPELINE_NAME").unwrap_or_else(|| "data_pipeline".to_string()),
        "description": get("PIPELINE_DESCRIPTION").unwrap_or_default(),
        "extractor": {
            "type": get("EXTRACTOR_TYPE").unwrap_or_else(|| "csv".to_string()),
            "config": extractor,
        },
        "transformer": {
            "type": get("TRANSFORMER_TYPE").unwrap_or_else(|| "passthrough".to_string()),
            "config": transformer,
        },
        "loader": {
            "type": loader_type,
            "config": loader,
        },
    });

    if DATABASE_ENV_KEYS.iter().all(|key| get(key).is_some()) {
        let port = get("DB_PORT").unwrap_or_default();
        let port: i64 = port
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::invalid("DB_PORT", format!("'{port}' is not a number")))?;
        document["database"] = json!({
            "host": get("DB_HOST"),
            "port": port,
            "user": get("DB_USER"),
            "password": get("DB_PASSWORD"),
            "database": get("DB_NAME"),
            "charset": get("DB_CHARSET").unwrap_or_else(|| "utf8mb4".to_string()),
        });
    }

    Ok(document)
}

fn parse_count(key: &str, raw: &str) -> Result<u64, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::invalid(key, format!("'{raw}' is not a non-negative integer")))
}
