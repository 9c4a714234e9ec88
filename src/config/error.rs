//! Configuration errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or validating a pipeline configuration
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Stage selector names a variant that does not exist
    #[error("Unsupported {stage} type '{value}'. {stage} type must be one of: [{}]", .supported.join(", "))]
    UnsupportedType {
        stage: &'static str,
        value: String,
        supported: Vec<&'static str>,
    },

    /// Required fields are absent
    #[error("Missing required {stage} config keys: [{}]", .fields.join(", "))]
    MissingFields { stage: String, fields: Vec<String> },

    /// Numeric value outside its declared range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Text value empty after trimming
    #[error("{0} cannot be empty")]
    Empty(String),

    /// Value present but unusable
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Stage options rejected by the stage constructor
    #[error("Invalid {stage} configuration: {message}")]
    InvalidStageConfig { stage: String, message: String },

    /// Configuration document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Configuration file could not be read
    #[error("IO error with {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file extension is not recognised
    #[error("Unsupported config file type: {0}")]
    UnsupportedFileType(String),

    /// Variant compiled out of this build
    #[error("{feature} support not enabled. Build with --features {feature}")]
    FeatureDisabled { feature: &'static str },
}

impl ConfigurationError {
    /// Create an invalid-value error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a stage configuration error
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStageConfig {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ConfigurationError::UnsupportedType { .. } => {
                format!("{self}\n\nHint: Check the 'type' field of the stage configuration.")
            }
            ConfigurationError::MissingFields { .. } => format!(
                "{self}\n\nHint: Set the database section (or DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_NAME)."
            ),
            ConfigurationError::Io { path, .. } => format!(
                "{self}\n\nHint: Check that {} exists and is readable.",
                path.display()
            ),
            ConfigurationError::FeatureDisabled { .. } => {
                format!("{self}\n\nHint: Rebuild with the named cargo feature enabled.")
            }
            _ => self.to_string(),
        }
    }
}
