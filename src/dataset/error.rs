//! Structural validation errors for datasets

use thiserror::Error;

use super::value::DataType;

/// A dataset handed to a stage is structurally invalid
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two columns share a name
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A column length differs from the first column
    #[error("Column '{column}' has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A cell does not match its column type
    #[error("Column '{column}' row {row} does not hold a {expected} value")]
    TypeMismatch {
        column: String,
        row: usize,
        expected: DataType,
    },

    /// A row has the wrong number of cells
    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Per-invocation parameters could not be applied
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

impl ValidationError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::DuplicateColumn(name) => format!(
                "Duplicate column name: {name}\n\nHint: Column names must be unique within a dataset."
            ),
            ValidationError::InvalidParams(msg) => {
                format!("Invalid parameters: {msg}\n\nHint: Check the transform parameters.")
            }
            _ => self.to_string(),
        }
    }
}
