//! Tabular dataset shared by every pipeline stage
//!
//! A [`Dataset`] is an ordered list of uniquely named columns of equal length.
//! Stages never mutate the dataset handed to them; each stage returns a new value.

mod error;
mod infer;
mod value;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use error::ValidationError;
pub use infer::{NULL_MARKERS, infer_from_text, is_null_marker, unify_values};
pub use value::{DataType, Value};

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Inferred column type
    pub data_type: DataType,
    /// Cell values in row order
    pub values: Vec<Value>,
}

impl Column {
    /// Create a column, inferring its type from the values
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let (data_type, values) = unify_values(values);
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Create a column with an explicit type (not checked against the values)
    pub fn with_type(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the column has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if every cell is missing
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }
}

/// In-memory tabular data: ordered, uniquely named columns of equal length
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Create a dataset, checking every structural invariant
    pub fn new(columns: Vec<Column>) -> Result<Self, ValidationError> {
        let dataset = Self { columns };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Create a dataset without checking its invariants
    ///
    /// Stages re-check structure with [`Dataset::validate`] before using the data.
    pub fn new_unchecked(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// A dataset with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a dataset from row-major values, inferring column types
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ValidationError> {
        let width = names.len();
        let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(ValidationError::RowWidth {
                    row: index,
                    expected: width,
                    found: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let columns = names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Self::new(columns)
    }

    /// Check the structural invariants: unique names, equal lengths, typed cells
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut names = HashSet::new();
        for column in &self.columns {
            if !names.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }
        }

        if let Some(first) = self.columns.first() {
            let expected = first.len();
            for column in &self.columns {
                if column.len() != expected {
                    return Err(ValidationError::LengthMismatch {
                        column: column.name.clone(),
                        expected,
                        found: column.len(),
                    });
                }
            }
        }

        for column in &self.columns {
            if let Some(row) = column
                .values
                .iter()
                .position(|value| !column.data_type.accepts(value))
            {
                return Err(ValidationError::TypeMismatch {
                    column: column.name.clone(),
                    row,
                    expected: column.data_type,
                });
            }
        }

        Ok(())
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Check if the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Columns in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of columns where every cell is missing
    pub fn all_null_columns(&self) -> Vec<&str> {
        if self.is_empty() {
            return Vec::new();
        }
        self.columns
            .iter()
            .filter(|c| c.is_all_null())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Cells of one row in column order
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Iterate rows in order
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.num_rows()).filter_map(move |index| self.row(index))
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| {
                        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (column.name.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }

    /// Approximate in-memory size of all cells
    pub fn estimated_size_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.name.len() + c.values.iter().map(Value::size_bytes).sum::<usize>())
            .sum()
    }
}
