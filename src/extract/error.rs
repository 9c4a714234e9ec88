//! Extraction errors

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure class of an [`ExtractionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionErrorKind {
    InvalidSource,
    FileNotFound,
    NotAFile,
    Unreadable,
    EmptyContent,
    Malformed,
    Decode,
    ResourceExhausted,
    InvalidParams,
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidSource => "invalid_source",
            Self::FileNotFound => "file_not_found",
            Self::NotAFile => "not_a_file",
            Self::Unreadable => "unreadable",
            Self::EmptyContent => "empty_content",
            Self::Malformed => "malformed",
            Self::Decode => "decode",
            Self::ResourceExhausted => "resource_exhausted",
            Self::InvalidParams => "invalid_params",
        };
        f.write_str(name)
    }
}

/// Errors raised while reading a source into a dataset
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Source identifier is blank
    #[error("Invalid CSV source: '{0}'")]
    InvalidSource(String),

    #[error("CSV file does not exist: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Source is not a file: {}", .path.display())]
    NotAFile { path: PathBuf },

    #[error("CSV file is not readable: {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No header and no data
    #[error("CSV file is empty: {}", .path.display())]
    EmptyContent { path: PathBuf },

    /// Structurally invalid rows (unbalanced quotes, too many fields)
    #[error("Error parsing CSV file {} at line {line}: {message}", .path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        message: String,
    },

    /// Bytes do not match the declared encoding
    #[error("Encoding error reading CSV file {} ({encoding}): {message}", .path.display())]
    Decode {
        path: PathBuf,
        encoding: String,
        message: String,
    },

    /// File or row data exceeds the allowed or available memory
    #[error("File too large to load into memory: {}: {message}", .path.display())]
    ResourceExhausted { path: PathBuf, message: String },

    /// Per-invocation parameters could not be applied
    #[error("Invalid extract parameters: {0}")]
    InvalidParams(String),
}

impl ExtractionError {
    /// Failure class, for branching without matching on fields
    pub fn kind(&self) -> ExtractionErrorKind {
        match self {
            Self::InvalidSource(_) => ExtractionErrorKind::InvalidSource,
            Self::FileNotFound { .. } => ExtractionErrorKind::FileNotFound,
            Self::NotAFile { .. } => ExtractionErrorKind::NotAFile,
            Self::Unreadable { .. } => ExtractionErrorKind::Unreadable,
            Self::EmptyContent { .. } => ExtractionErrorKind::EmptyContent,
            Self::Malformed { .. } => ExtractionErrorKind::Malformed,
            Self::Decode { .. } => ExtractionErrorKind::Decode,
            Self::ResourceExhausted { .. } => ExtractionErrorKind::ResourceExhausted,
            Self::InvalidParams(_) => ExtractionErrorKind::InvalidParams,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { .. } => format!("{self}\n\nHint: Check the source path."),
            Self::Decode { .. } => {
                format!("{self}\n\nHint: Set the extractor 'encoding' option (e.g. latin-1).")
            }
            Self::Malformed { .. } => {
                format!("{self}\n\nHint: Check quoting and the 'delimiter' option.")
            }
            Self::ResourceExhausted { .. } => {
                format!("{self}\n\nHint: Raise 'max_file_bytes' or cap rows with 'max_rows'.")
            }
            _ => self.to_string(),
        }
    }
}
