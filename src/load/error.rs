//! Load and connection errors

use thiserror::Error;

use crate::dataset::ValidationError;

/// Destination could not be reached or verified
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Database connection failed ({target}): {message}")]
pub struct ConnectionError {
    /// Connection target, without credentials
    pub target: String,
    pub message: String,
}

impl ConnectionError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by loader operations
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Not connected to database. Call connect() first.")]
    NotConnected,

    #[error("Invalid data for loading into '{destination}': {source}")]
    InvalidData {
        destination: String,
        #[source]
        source: ValidationError,
    },

    /// Existence policy is `fail` and the table is already there
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Database error writing to '{destination}': {message}")]
    Write { destination: String, message: String },

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Invalid destination table name: '{0}'")]
    InvalidDestination(String),

    #[error("Invalid load parameters: {0}")]
    InvalidParams(String),
}

impl LoadError {
    pub(crate) fn write(destination: &str, message: impl ToString) -> Self {
        Self::Write {
            destination: destination.to_string(),
            message: message.to_string(),
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Connection(_) => format!(
                "{self}\n\nHint: Check the database host, port and credentials."
            ),
            LoadError::NotConnected => {
                format!("{self}\n\nHint: Acquire the loader with ConnectionGuard before loading.")
            }
            LoadError::TableExists(_) => {
                format!("{self}\n\nHint: Use if_exists=replace or if_exists=append.")
            }
            _ => self.to_string(),
        }
    }
}
