//! CLI command implementations

pub mod info;
pub mod query;
pub mod run;
pub mod upload;
pub mod validate;

use std::path::Path;

use crate::cli::error::CliError;
use crate::config::{PipelineConfig, StageOptions};

/// Load configuration from a file, or from the environment and `./.env`
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::from_env()?,
    };
    Ok(config)
}

/// Parse a `KEY=VALUE` override; the value is read as JSON when it parses
/// and kept as a string otherwise
pub fn parse_param(raw: &str) -> Result<(String, serde_json::Value), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("expected KEY=VALUE, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidArgument(format!("empty key in '{raw}'")));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Collect `KEY=VALUE` overrides into stage options
pub fn params_map(raw: &[String]) -> Result<StageOptions, CliError> {
    raw.iter().map(|item| parse_param(item)).collect()
}
