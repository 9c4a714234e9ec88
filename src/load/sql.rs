//! Relational loader shared by every SQL backend
//!
//! [`SqlLoader`] holds the connection state machine, existence policy and load
//! log; a [`SqlBackend`] only knows how to open a [`SqlConnection`] and how its
//! dialect quotes and types columns.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, debug, error, info, info_span, warn};

use super::error::{ConnectionError, LoadError};
use super::{ExistsPolicy, LoadOutcome, LoadRecord, Loader, TableInfo};
use crate::config::{StageOptions, overlay_settings};
use crate::dataset::{DataType, Dataset};
use crate::oplog::OperationLog;

static READ_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(SELECT|WITH|SHOW|DESCRIBE|EXPLAIN)\b").expect("valid read-query pattern"));

/// Driver-level failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct SqlError(pub String);

/// Check whether a statement returns rows
pub fn is_read_query(query: &str) -> bool {
    READ_QUERY.is_match(query)
}

/// Options every SQL loader accepts, overridable per load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadSettings {
    /// Existence policy used when a load does not override it
    pub if_exists: ExistsPolicy,
    /// Rows per insert batch
    pub batch_size: usize,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            if_exists: ExistsPolicy::Append,
            batch_size: 1000,
        }
    }
}

/// Opens connections to one SQL destination
pub trait SqlBackend: Send {
    type Connection: SqlConnection;

    /// Loader variant name
    fn kind(&self) -> &'static str;

    /// Human-readable connection target, without credentials
    fn target(&self) -> String;

    fn open(&self) -> Result<Self::Connection, SqlError>;

    /// Backend-specific metadata fields
    fn describe(&self) -> StageOptions;
}

/// One open connection in a backend's dialect
pub trait SqlConnection: Send {
    /// Trivial round trip (`SELECT 1`)
    fn probe(&mut self) -> Result<(), SqlError>;

    fn table_exists(&mut self, table: &str) -> Result<bool, SqlError>;

    /// Column names and declared types in ordinal order
    fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>, SqlError>;

    fn quote_identifier(&self, name: &str) -> String;

    /// Column type used when creating tables
    fn column_type(&self, data_type: DataType) -> &'static str;

    /// Run a statement that returns no rows
    fn execute(&mut self, sql: &str) -> Result<(), SqlError>;

    /// Run a statement and collect its rows
    fn query(&mut self, sql: &str) -> Result<Dataset, SqlError>;

    /// Insert every row of `data` in one transaction, returning the row count
    fn insert_rows(&mut self, table: &str, data: &Dataset, batch_size: usize) -> Result<usize, SqlError>;

    /// Close the connection
    fn close(self) -> Result<(), SqlError>
    where
        Self: Sized;

    fn create_table(&mut self, table: &str, data: &Dataset) -> Result<(), SqlError> {
        let columns: Vec<String> = data
            .columns()
            .iter()
            .map(|c| format!("{} {}", self.quote_identifier(&c.name), self.column_type(c.data_type)))
            .collect();
        let sql = format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            columns.join(", ")
        );
        self.execute(&sql)
    }

    fn drop_table(&mut self, table: &str) -> Result<(), SqlError> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table));
        self.execute(&sql)
    }

    /// Parameterised insert statement for the dataset's columns
    fn insert_statement(&self, table: &str, data: &Dataset) -> String {
        let names: Vec<String> = data
            .column_names()
            .into_iter()
            .map(|name| self.quote_identifier(name))
            .collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            names.join(", "),
            placeholders
        )
    }
}

/// Loader for any SQL backend
pub struct SqlLoader<B: SqlBackend> {
    backend: B,
    options: StageOptions,
    settings: LoadSettings,
    connection: Option<B::Connection>,
    log: OperationLog<LoadRecord>,
    span: Span,
}

impl<B: SqlBackend> SqlLoader<B> {
    /// Create a disconnected loader
    pub fn new(backend: B, options: StageOptions, settings: LoadSettings) -> Self {
        let span = info_span!("loader", kind = backend.kind());
        Self {
            backend,
            options,
            settings,
            connection: None,
            log: OperationLog::new(),
            span,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Static load settings
    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    fn try_load(
        &mut self,
        data: &Dataset,
        destination: &str,
        params: &StageOptions,
    ) -> Result<(LoadOutcome, &'static str), LoadError> {
        let settings = overlay_settings("loader", &self.settings, params)
            .map_err(|e| LoadError::InvalidParams(e.to_string()))?;
        if !self.is_connected() {
            return Err(LoadError::NotConnected);
        }
        if destination.trim().is_empty() || destination.contains('\0') {
            return Err(LoadError::InvalidDestination(destination.to_string()));
        }
        data.validate().map_err(|source| LoadError::InvalidData {
            destination: destination.to_string(),
            source,
        })?;
        self.validate_data(data);

        let policy = settings.if_exists;
        info!(
            rows = data.num_rows(),
            destination,
            mode = %policy,
            "Loading rows into table"
        );

        let Some(conn) = self.connection.as_mut() else {
            return Err(LoadError::NotConnected);
        };
        let table_existed = conn
            .table_exists(destination)
            .map_err(|e| LoadError::write(destination, e))?;

        let create = match (policy, table_existed) {
            (ExistsPolicy::Fail, true) => return Err(LoadError::TableExists(destination.to_string())),
            (ExistsPolicy::Append, true) => false,
            (ExistsPolicy::Replace, true) | (_, false) => true,
        };

        if create {
            if data.num_columns() == 0 {
                return Err(LoadError::write(
                    destination,
                    "cannot create a table without columns",
                ));
            }
            if table_existed {
                conn.drop_table(destination)
                    .map_err(|e| LoadError::write(destination, e))?;
            }
            conn.create_table(destination, data)
                .map_err(|e| LoadError::write(destination, e))?;
        }

        let rows_loaded = if data.num_columns() == 0 {
            0
        } else {
            conn.insert_rows(destination, data, settings.batch_size.max(1))
                .map_err(|e| LoadError::write(destination, e))?
        };

        let operation = if table_existed { "loaded" } else { "created and loaded" };
        Ok((
            LoadOutcome {
                destination: destination.to_string(),
                rows_loaded,
                columns_loaded: data.num_columns(),
                table_existed,
                if_exists: policy,
            },
            operation,
        ))
    }

    fn record(&mut self, data: &Dataset, destination: &str, operation: &str, success: bool) {
        let stats = self.load_stats(data, destination);
        info!(
            operation,
            status = if success { "SUCCESS" } else { "FAILED" },
            rows = stats.rows_loaded,
            destination,
            "Load operation"
        );
        self.log.append(LoadRecord {
            operation: operation.to_string(),
            timestamp: Utc::now(),
            success,
            stats,
        });
    }
}

impl<B: SqlBackend> Loader for SqlLoader<B> {
    fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    fn connect(&mut self) -> Result<(), ConnectionError> {
        let _enter = self.span.enter();
        if self.connection.is_some() {
            info!("Already connected to database");
            return Ok(());
        }

        let target = self.backend.target();
        info!(endpoint = %target, "Connecting to database");
        let mut conn = self.backend.open().map_err(|e| {
            error!(endpoint = %target, error = %e, "Failed to connect to database");
            ConnectionError::new(&target, e.0)
        })?;

        if let Err(e) = conn.probe() {
            error!(endpoint = %target, error = %e, "Connection probe failed");
            if let Err(close_err) = conn.close() {
                debug!(error = %close_err, "Error closing unverified connection");
            }
            return Err(ConnectionError::new(&target, e.0));
        }

        self.connection = Some(conn);
        info!(endpoint = %target, "Successfully connected to database");
        Ok(())
    }

    fn disconnect(&mut self) {
        let _enter = self.span.enter();
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close() {
                warn!(error = %e, "Error during disconnect");
            }
            info!("Disconnected from database");
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn load(
        &mut self,
        data: &Dataset,
        destination: &str,
        params: &StageOptions,
    ) -> Result<LoadOutcome, LoadError> {
        let span = self.span.clone();
        let _enter = span.enter();

        match self.try_load(data, destination, params) {
            Ok((outcome, operation)) => {
                self.record(data, destination, operation, true);
                info!(rows = outcome.rows_loaded, destination, "Successfully loaded rows");
                Ok(outcome)
            }
            Err(e) => {
                self.record(data, destination, "load", false);
                error!(destination, error = %e, "Error loading data");
                Err(e)
            }
        }
    }

    fn table_exists(&mut self, name: &str) -> bool {
        let _enter = self.span.enter();
        let Some(conn) = self.connection.as_mut() else {
            error!(table = name, "Error checking if table exists: not connected");
            return false;
        };
        conn.table_exists(name).unwrap_or_else(|e| {
            error!(table = name, error = %e, "Error checking if table exists");
            false
        })
    }

    fn table_info(&mut self, name: &str) -> Option<TableInfo> {
        if !self.table_exists(name) {
            return None;
        }
        let conn = self.connection.as_mut()?;
        match conn.table_columns(name) {
            Ok(columns) => {
                let (columns, column_types) = columns.into_iter().unzip();
                Some(TableInfo {
                    table_name: name.to_string(),
                    columns,
                    column_types,
                })
            }
            Err(e) => {
                error!(table = name, error = %e, "Error getting table info");
                None
            }
        }
    }

    fn execute_query(&mut self, query: &str) -> Result<Option<Dataset>, LoadError> {
        let _enter = self.span.enter();
        let Some(conn) = self.connection.as_mut() else {
            return Err(LoadError::NotConnected);
        };
        let preview: String = query.chars().take(100).collect();
        info!(query = %preview, "Executing query");

        let result = if is_read_query(query) {
            conn.query(query).map(Some)
        } else {
            conn.execute(query).map(|()| None)
        };
        result.map_err(|e| {
            error!(error = %e, "Error executing query");
            LoadError::Query(e.0)
        })
    }

    fn load_log(&self) -> Vec<LoadRecord> {
        self.log.snapshot()
    }

    fn clear_load_log(&mut self) {
        self.log.clear();
    }

    fn metadata(&self) -> StageOptions {
        let mut metadata = StageOptions::new();
        metadata.insert("loader_type".into(), self.kind().into());
        metadata.insert(
            "config".into(),
            serde_json::Value::Object(redact(&self.options)),
        );
        metadata.insert("is_connected".into(), self.is_connected().into());
        metadata.insert("load_operations_count".into(), self.log.len().into());
        metadata.insert("target".into(), self.backend.target().into());
        metadata.insert("if_exists_mode".into(), self.settings.if_exists.as_str().into());
        metadata.extend(self.backend.describe());
        metadata
    }

    fn config(&self) -> &StageOptions {
        &self.options
    }
}

impl<B: SqlBackend> Drop for SqlLoader<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Copy of stage options with secrets masked
pub(crate) fn redact(options: &StageOptions) -> StageOptions {
    options
        .iter()
        .map(|(key, value)| {
            if key.eq_ignore_ascii_case("password") {
                (key.clone(), serde_json::json!("***"))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}
