//! Pipeline configuration
//!
//! A [`PipelineConfig`] names the pipeline, selects one variant per stage with
//! its options, and optionally carries a database connection section. Every
//! loading path (structured literal, TOML/YAML/JSON, environment, `.env`)
//! validates before returning, so an invalid configuration never exists.

mod database;
mod env;
mod error;
mod stage;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use database::DatabaseConfig;
pub use env::DATABASE_ENV_KEYS;
pub use error::ConfigurationError;
pub use stage::{ExtractorType, LoaderType, StageOptions, TransformerType};

pub(crate) use stage::{overlay_settings, parse_settings};

fn default_name() -> String {
    "data_pipeline".to_string()
}

/// Extractor selection and options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorSpec {
    /// Extractor variant
    #[serde(rename = "type")]
    pub kind: ExtractorType,
    /// Variant options
    #[serde(default)]
    pub config: StageOptions,
}

/// Transformer selection and options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    /// Transformer variant
    #[serde(rename = "type")]
    pub kind: TransformerType,
    /// Variant options
    #[serde(default)]
    pub config: StageOptions,
}

/// Loader selection and options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSpec {
    /// Loader variant
    #[serde(rename = "type")]
    pub kind: LoaderType,
    /// Variant options
    #[serde(default)]
    pub config: StageOptions,
}

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name (non-empty after trimming)
    #[serde(default = "default_name")]
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Extractor stage
    pub extractor: ExtractorSpec,
    /// Transformer stage
    pub transformer: TransformerSpec,
    /// Loader stage
    pub loader: LoaderSpec,
    /// Connection section for server-backed loaders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            extractor: ExtractorSpec {
                kind: ExtractorType::Csv,
                config: StageOptions::new(),
            },
            transformer: TransformerSpec {
                kind: TransformerType::Passthrough,
                config: StageOptions::new(),
            },
            loader: LoaderSpec {
                kind: LoaderType::Mysql,
                config: StageOptions::new(),
            },
            database: None,
        }
    }
}

impl PipelineConfig {
    /// Create a config with default stages (csv, passthrough, mysql)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Select the extractor variant
    pub fn with_extractor(mut self, kind: ExtractorType) -> Self {
        self.extractor.kind = kind;
        self
    }

    /// Set one extractor option
    pub fn with_extractor_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extractor.config.insert(key.into(), value.into());
        self
    }

    /// Select the transformer variant
    pub fn with_transformer(mut self, kind: TransformerType) -> Self {
        self.transformer.kind = kind;
        self
    }

    /// Set one transformer option
    pub fn with_transformer_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.transformer.config.insert(key.into(), value.into());
        self
    }

    /// Select the loader variant
    pub fn with_loader(mut self, kind: LoaderType) -> Self {
        self.loader.kind = kind;
        self
    }

    /// Set one loader option
    pub fn with_loader_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.loader.config.insert(key.into(), value.into());
        self
    }

    /// Set the database section
    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.database = Some(database);
        self
    }

    /// Check every field, returning the normalized config
    pub fn validated(mut self) -> Result<Self, ConfigurationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigurationError::Empty("Pipeline name".to_string()));
        }
        self.name = name.to_string();
        self.database = self.database.map(DatabaseConfig::validated).transpose()?;
        Ok(self)
    }

    /// Check every field without consuming the config
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.clone().validated().map(|_| ())
    }

    /// Build from a structured literal
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigurationError> {
        check_document(&value)?;
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validated()
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self, ConfigurationError> {
        let value = serde_json::from_str(content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        let value = toml::from_str(content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigurationError> {
        let value = serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Load a TOML, YAML, JSON or `.env` file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let is_env_file = extension == "env" || path.file_name().and_then(|n| n.to_str()) == Some(".env");

        info!(path = %path.display(), "Loading pipeline configuration");
        if is_env_file {
            return Self::from_env_file(path);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match extension.as_str() {
            "toml" => Self::from_toml_str(&content),
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(ConfigurationError::UnsupportedFileType(format!(".{other}"))),
        }
    }

    /// Load a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from the process environment, reading `./.env` when present
    ///
    /// Variables already set in the process win over `.env` entries.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let dotenv_path = Path::new(".env");
        let file_vars = if dotenv_path.is_file() {
            env::read_env_file(dotenv_path)?
        } else {
            Default::default()
        };
        info!("Loading configuration from environment variables");
        Self::from_env_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Load from a `.env` file layered under the process environment
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let file_vars = env::read_env_file(path.as_ref())?;
        Self::from_env_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Load from an arbitrary key lookup (used for tests and embedding)
    pub fn from_env_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_value(env::document_from_lookup(lookup)?)
    }

    /// Extractor options merged with the type tag
    pub fn extractor_config(&self) -> StageOptions {
        tagged(self.extractor.kind.name(), &self.extractor.config)
    }

    /// Transformer options merged with the type tag
    pub fn transformer_config(&self) -> StageOptions {
        tagged(self.transformer.kind.name(), &self.transformer.config)
    }

    /// Loader options merged with the type tag
    pub fn loader_config(&self) -> StageOptions {
        tagged(self.loader.kind.name(), &self.loader.config)
    }

    /// Database section as an option map
    pub fn database_config(&self) -> Option<StageOptions> {
        self.database.as_ref().map(DatabaseConfig::to_options)
    }

    /// Loader options with the database section merged in for server-backed loaders
    pub(crate) fn resolved_loader_options(&self) -> StageOptions {
        let mut options = self.loader.config.clone();
        if self.loader.kind.requires_connection() {
            if let Some(database) = &self.database {
                options.extend(database.to_options());
            }
        }
        options
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config(name={}, extractor={}, transformer={}, loader={})",
            self.name, self.extractor.kind, self.transformer.kind, self.loader.kind
        )
    }
}

fn tagged(kind: &str, config: &StageOptions) -> StageOptions {
    let mut options = config.clone();
    options.insert("type".to_string(), serde_json::Value::String(kind.to_string()));
    options
}

/// Report missing stages and bad selectors with typed errors before serde does
fn check_document(value: &serde_json::Value) -> Result<(), ConfigurationError> {
    let Some(object) = value.as_object() else {
        return Err(ConfigurationError::Parse(
            "configuration must be a mapping".to_string(),
        ));
    };

    let missing: Vec<String> = ["extractor", "transformer", "loader"]
        .into_iter()
        .filter(|stage| !object.contains_key(*stage))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ConfigurationError::MissingFields {
            stage: "pipeline".to_string(),
            fields: missing,
        });
    }

    let selector = |stage: &str| object.get(stage).and_then(|s| s.get("type")).and_then(|t| t.as_str());
    if let Some(kind) = selector("extractor") {
        kind.parse::<ExtractorType>()?;
    }
    if let Some(kind) = selector("transformer") {
        kind.parse::<TransformerType>()?;
    }
    if let Some(kind) = selector("loader") {
        kind.parse::<LoaderType>()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn sample() -> serde_json::Value {
        json!({
            "name": "  test_pipeline ",
            "description": "Test pipeline",
            "extractor": {"type": "csv", "config": {"delimiter": ","}},
            "transformer": {"type": "passthrough", "config": {"log_details": true}},
            "loader": {"type": "mysql", "config": {"if_exists": "replace"}},
            "database": {
                "host": "localhost",
                "port": 3306,
                "user": "test_user",
                "password": "test_password",
                "database": "test_db"
            }
        })
    }

    #[test]
    fn test_from_value() {
        let config = PipelineConfig::from_value(sample()).unwrap();
        assert_eq!(config.name, "test_pipeline");
        assert_eq!(config.extractor.kind, ExtractorType::Csv);
        assert_eq!(config.loader.kind, LoaderType::Mysql);
        assert_eq!(config.database.as_ref().unwrap().charset, "utf8mb4");
    }

    #[test]
    fn test_accessors_add_type_tag() {
        let config = PipelineConfig::from_value(sample()).unwrap();
        let extractor = config.extractor_config();
        assert_eq!(extractor["type"], json!("csv"));
        assert_eq!(extractor["delimiter"], json!(","));
        assert_eq!(config.transformer_config()["type"], json!("passthrough"));
        assert_eq!(config.loader_config()["if_exists"], json!("replace"));
        assert_eq!(config.database_config().unwrap()["port"], json!(3306));
    }

    #[test]
    fn test_unsupported_types_fail_fast() {
        for (stage, bad) in [("extractor", "xml"), ("transformer", "pivot"), ("loader", "oracle")] {
            let mut doc = sample();
            doc[stage]["type"] = json!(bad);
            let err = PipelineConfig::from_value(doc).unwrap_err();
            assert!(
                matches!(err, ConfigurationError::UnsupportedType { .. }),
                "{stage}: {err}"
            );
        }
    }

    #[test]
    fn test_missing_stage() {
        let mut doc = sample();
        doc.as_object_mut().unwrap().remove("loader");
        let err = PipelineConfig::from_value(doc).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingFields { fields, .. } if fields == vec!["loader"]));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut doc = sample();
        doc["name"] = json!("   ");
        assert!(matches!(
            PipelineConfig::from_value(doc),
            Err(ConfigurationError::Empty(_))
        ));
    }

    #[test]
    fn test_database_port_validated() {
        let mut doc = sample();
        doc["database"]["port"] = json!(70000);
        assert!(matches!(
            PipelineConfig::from_value(doc),
            Err(ConfigurationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_toml_and_yaml() {
        let toml_doc = r#"
name = "toml_pipeline"

[extractor]
type = "csv"

[transformer]
type = "passthrough"

[loader]
type = "duckdb"
config = { if_exists = "append" }
"#;
        let config = PipelineConfig::from_toml_str(toml_doc).unwrap();
        assert_eq!(config.loader.kind, LoaderType::Duckdb);
        assert!(config.database.is_none());

        let yaml_doc = "extractor:\n  type: csv\ntransformer:\n  type: passthrough\nloader:\n  type: mysql\n";
        let config = PipelineConfig::from_yaml_str(yaml_doc).unwrap();
        assert_eq!(config.name, "data_pipeline");
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("pipeline.json");
        std::fs::write(&json_path, sample().to_string()).unwrap();
        assert_eq!(PipelineConfig::from_file(&json_path).unwrap().name, "test_pipeline");

        let ini_path = dir.path().join("pipeline.ini");
        std::fs::write(&ini_path, "x").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&ini_path),
            Err(ConfigurationError::UnsupportedFileType(_))
        ));

        assert!(matches!(
            PipelineConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigurationError::Io { .. })
        ));
    }

    #[test]
    fn test_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.env");
        std::fs::write(
            &path,
            "PIPELINE_NAME=env_file_pipeline_x81\nLOADER_TYPE=duckdb\nCSV_DELIMITER=;\n",
        )
        .unwrap();
        let config = PipelineConfig::from_env_file(&path).unwrap();
        assert_eq!(config.name, "env_file_pipeline_x81");
        assert_eq!(config.loader.kind, LoaderType::Duckdb);
        assert_eq!(config.extractor.config["delimiter"], json!(";"));
    }

    #[test]
    fn test_env_lookup_with_database() {
        let vars: HashMap<&str, &str> = [
            ("PIPELINE_NAME", "env_pipeline"),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "3306"),
            ("DB_USER", "root"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "warehouse"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::from_env_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.name, "env_pipeline");
        let database = config.database.as_ref().unwrap();
        assert_eq!(database.database, "warehouse");
        assert_eq!(config.resolved_loader_options()["host"], json!("localhost"));
    }

    #[test]
    fn test_env_lookup_rejects_unknown_type() {
        let err = PipelineConfig::from_env_lookup(|k| (k == "EXTRACTOR_TYPE").then(|| "parquet".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnsupportedType { stage: "Extractor", .. }));
    }

    #[test]
    fn test_builder_and_display() {
        let config = PipelineConfig::new()
            .with_name("built")
            .with_loader(LoaderType::Duckdb)
            .with_loader_option("if_exists", "replace");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.to_string(),
            "Config(name=built, extractor=csv, transformer=passthrough, loader=duckdb)"
        );
        assert!(config.resolved_loader_options().get("host").is_none());
    }
}
