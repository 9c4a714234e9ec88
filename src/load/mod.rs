//! Load stage
//!
//! A [`Loader`] owns the connection to a destination and writes datasets
//! into it. The connection is either fully established or absent; use
//! [`ConnectionGuard`] to hold it for a scope.

mod duckdb;
mod error;
mod mysql;
mod sql;

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use self::duckdb::DuckDbSettings;
#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::{DuckDbBackend, DuckDbConnection, DuckDbLoader};
pub use self::mysql::{MySqlSettings, REQUIRED_MYSQL_KEYS};
#[cfg(feature = "mysql")]
pub use self::mysql::{MySqlBackend, MySqlConnection, MySqlLoader};
pub use error::{ConnectionError, LoadError};
pub use sql::{LoadSettings, SqlBackend, SqlConnection, SqlError, SqlLoader, is_read_query};
pub(crate) use sql::redact;

use crate::config::StageOptions;
use crate::dataset::Dataset;

pub(crate) use self::duckdb::build as build_duckdb;
pub(crate) use self::mysql::build as build_mysql;

/// What to do when the destination table already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistsPolicy {
    /// Refuse to write
    Fail,
    /// Drop and recreate the table
    Replace,
    /// Insert after existing rows
    #[default]
    Append,
}

impl ExistsPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for ExistsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExistsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            "append" => Ok(Self::Append),
            other => Err(format!(
                "if_exists must be one of: [fail, replace, append], got '{other}'"
            )),
        }
    }
}

/// Result of one successful load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub destination: String,
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    /// Whether the table was present before the write
    pub table_existed: bool,
    /// Existence policy applied to this load
    pub if_exists: ExistsPolicy,
}

/// Size of one load operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub destination: String,
    pub rows_loaded: usize,
    pub columns_loaded: usize,
    pub data_size_bytes: usize,
    pub loader_type: String,
}

/// One load log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    /// "created and loaded", "loaded", or "load" for failures
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(flatten)]
    pub stats: LoadStats,
}

/// Table description returned by [`Loader::table_info`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub table_name: String,
    pub columns: Vec<String>,
    pub column_types: Vec<String>,
}

/// Destination writer contract
///
/// State machine: disconnected, connected, disconnected. `connect` and
/// `disconnect` are the only transitions.
pub trait Loader: Send {
    /// Variant name, as used in configuration
    fn kind(&self) -> &'static str;

    /// Connect and verify with a round-trip probe; no-op when already connected
    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Release the connection; never fails, release errors are only logged
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Write `data` into `destination`
    ///
    /// Requires a connection. Every call, successful or not, appends a load
    /// log entry.
    fn load(
        &mut self,
        data: &Dataset,
        destination: &str,
        params: &StageOptions,
    ) -> Result<LoadOutcome, LoadError>;

    /// Non-failing pre-check; an empty dataset is valid
    fn validate_data(&self, data: &Dataset) -> bool {
        if let Err(e) = data.validate() {
            warn!(error = %e, "Dataset failed validation");
            return false;
        }
        if data.is_empty() {
            warn!("Dataset is empty");
            return true;
        }
        let null_columns = data.all_null_columns();
        if !null_columns.is_empty() {
            warn!(columns = ?null_columns, "Columns with all null values");
        }
        true
    }

    /// Size statistics for a load
    fn load_stats(&self, data: &Dataset, destination: &str) -> LoadStats {
        LoadStats {
            destination: destination.to_string(),
            rows_loaded: data.num_rows(),
            columns_loaded: data.num_columns(),
            data_size_bytes: data.estimated_size_bytes(),
            loader_type: self.kind().to_string(),
        }
    }

    /// Check for a table; `false` both when absent and when not connected
    fn table_exists(&mut self, name: &str) -> bool;

    /// Column names and types of a table, if it exists
    fn table_info(&mut self, name: &str) -> Option<TableInfo>;

    /// Run a statement; read queries return a dataset, writes are committed
    fn execute_query(&mut self, query: &str) -> Result<Option<Dataset>, LoadError>;

    /// Copy of the load log
    fn load_log(&self) -> Vec<LoadRecord>;

    fn clear_load_log(&mut self);

    fn metadata(&self) -> StageOptions;

    /// Static options the loader was built with
    fn config(&self) -> &StageOptions;
}

/// Scoped connection: connects on acquire, disconnects on drop
///
/// ```rust,ignore
/// let mut guard = ConnectionGuard::acquire(&mut loader)?;
/// guard.load(&data, "users", &StageOptions::new())?;
/// // disconnected here, on every exit path
/// ```
pub struct ConnectionGuard<'a, L: Loader + ?Sized> {
    loader: &'a mut L,
}

impl<'a, L: Loader + ?Sized> ConnectionGuard<'a, L> {
    /// Connect the loader for the lifetime of the guard
    pub fn acquire(loader: &'a mut L) -> Result<Self, ConnectionError> {
        loader.connect()?;
        Ok(Self { loader })
    }
}

impl<L: Loader + ?Sized> Deref for ConnectionGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &Self::Target {
        &*self.loader
    }
}

impl<L: Loader + ?Sized> DerefMut for ConnectionGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.loader
    }
}

impl<L: Loader + ?Sized> Drop for ConnectionGuard<'_, L> {
    fn drop(&mut self) {
        self.loader.disconnect();
    }
}
