//! Stage selectors and per-stage option maps

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ConfigurationError;

/// Option name to value mapping for one stage
pub type StageOptions = serde_json::Map<String, serde_json::Value>;

/// Extractor variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ExtractorType {
    /// Comma separated values file
    Csv,
}

impl ExtractorType {
    /// Get all variants
    pub fn all() -> Vec<Self> {
        vec![Self::Csv]
    }

    /// Get the selector name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
        }
    }
}

/// Transformer variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TransformerType {
    /// Copy the input unchanged
    Passthrough,
}

impl TransformerType {
    /// Get all variants
    pub fn all() -> Vec<Self> {
        vec![Self::Passthrough]
    }

    /// Get the selector name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
        }
    }
}

/// Loader variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LoaderType {
    /// MySQL / MariaDB server
    Mysql,
    /// Embedded DuckDB database file
    Duckdb,
}

impl LoaderType {
    /// Get all variants
    pub fn all() -> Vec<Self> {
        vec![Self::Mysql, Self::Duckdb]
    }

    /// Get the selector name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Duckdb => "duckdb",
        }
    }

    /// Check whether the database section is merged into this loader's options
    pub fn requires_connection(&self) -> bool {
        matches!(self, Self::Mysql)
    }
}

macro_rules! impl_selector {
    ($ty:ty, $stage:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigurationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                <$ty>::all()
                    .into_iter()
                    .find(|variant| variant.name() == wanted)
                    .ok_or_else(|| ConfigurationError::UnsupportedType {
                        stage: $stage,
                        value: s.to_string(),
                        supported: <$ty>::all().iter().map(|v| v.name()).collect(),
                    })
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ConfigurationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

impl_selector!(ExtractorType, "Extractor");
impl_selector!(TransformerType, "Transformer");
impl_selector!(LoaderType, "Loader");

/// Deserialize typed stage settings from an option map
pub(crate) fn parse_settings<T: DeserializeOwned>(
    stage: &str,
    options: &StageOptions,
) -> Result<T, ConfigurationError> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .map_err(|e| ConfigurationError::stage(stage, e.to_string()))
}

/// Apply per-invocation overrides on top of typed settings
///
/// The base settings are untouched; the merged copy lives for one call only.
pub(crate) fn overlay_settings<T>(
    stage: &str,
    base: &T,
    overrides: &StageOptions,
) -> Result<T, ConfigurationError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    if overrides.is_empty() {
        return Ok(base.clone());
    }
    let mut merged = match serde_json::to_value(base) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => StageOptions::new(),
        Err(e) => return Err(ConfigurationError::stage(stage, e.to_string())),
    };
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    parse_settings(stage, &merged)
}
