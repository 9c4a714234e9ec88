//! Embedded DuckDB destination

use serde::{Deserialize, Serialize};

use super::sql::LoadSettings;
use super::{ExistsPolicy, Loader};
use crate::config::{ConfigurationError, StageOptions, parse_settings};

/// DuckDB loader options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuckDbSettings {
    /// Database file; `None` opens a fresh in-memory database on every connect
    pub path: Option<String>,
    pub if_exists: ExistsPolicy,
    pub batch_size: usize,
}

impl Default for DuckDbSettings {
    fn default() -> Self {
        let load = LoadSettings::default();
        Self {
            path: None,
            if_exists: load.if_exists,
            batch_size: load.batch_size,
        }
    }
}

impl DuckDbSettings {
    fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            if_exists: self.if_exists,
            batch_size: self.batch_size,
        }
    }
}

/// Registry constructor for the `duckdb` loader type
pub(crate) fn build(options: StageOptions) -> Result<Box<dyn Loader>, ConfigurationError> {
    #[cfg(feature = "duckdb-backend")]
    {
        let loader = DuckDbLoader::from_options(options)?;
        Ok(Box::new(loader))
    }
    #[cfg(not(feature = "duckdb-backend"))]
    {
        let _: DuckDbSettings = parse_settings("DuckDB loader", &options)?;
        Err(ConfigurationError::FeatureDisabled {
            feature: "duckdb-backend",
        })
    }
}

#[cfg(feature = "duckdb-backend")]
pub use backend::{DuckDbBackend, DuckDbConnection, DuckDbLoader};

#[cfg(feature = "duckdb-backend")]
mod backend {
    use std::path::PathBuf;

    use ::duckdb::types::Value as DuckValue;

    use super::{DuckDbSettings, parse_settings};
    use crate::config::{ConfigurationError, StageOptions};
    use crate::dataset::{Column, DataType, Dataset, Value};
    use crate::load::sql::{SqlBackend, SqlConnection, SqlError, SqlLoader};

    /// Loader writing into a DuckDB database
    pub type DuckDbLoader = SqlLoader<DuckDbBackend>;

    impl From<::duckdb::Error> for SqlError {
        fn from(e: ::duckdb::Error) -> Self {
            SqlError(e.to_string())
        }
    }

    impl DuckDbLoader {
        /// Build from `duckdb` loader options
        pub fn from_options(options: StageOptions) -> Result<Self, ConfigurationError> {
            let settings: DuckDbSettings = parse_settings("DuckDB loader", &options)?;
            let backend = DuckDbBackend::new(settings.path.clone());
            Ok(SqlLoader::new(backend, options, settings.load_settings()))
        }

        /// Loader over a database file
        pub fn open_path(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let mut options = StageOptions::new();
            options.insert("path".into(), path.to_string_lossy().into_owned().into());
            SqlLoader::new(
                DuckDbBackend::new(Some(path)),
                options,
                DuckDbSettings::default().load_settings(),
            )
        }
    }

    /// Opens DuckDB connections
    #[derive(Debug, Clone)]
    pub struct DuckDbBackend {
        path: Option<PathBuf>,
    }

    impl DuckDbBackend {
        pub fn new(path: Option<impl Into<PathBuf>>) -> Self {
            Self {
                path: path.map(Into::into),
            }
        }

        /// In-memory database
        pub fn memory() -> Self {
            Self { path: None }
        }

        pub fn path(&self) -> Option<&PathBuf> {
            self.path.as_ref()
        }
    }

    impl SqlBackend for DuckDbBackend {
        type Connection = DuckDbConnection;

        fn kind(&self) -> &'static str {
            "duckdb"
        }

        fn target(&self) -> String {
            match &self.path {
                Some(path) => path.display().to_string(),
                None => ":memory:".to_string(),
            }
        }

        fn open(&self) -> Result<Self::Connection, SqlError> {
            let conn = match &self.path {
                Some(path) => ::duckdb::Connection::open(path)?,
                None => ::duckdb::Connection::open_in_memory()?,
            };
            Ok(DuckDbConnection { conn })
        }

        fn describe(&self) -> StageOptions {
            let mut fields = StageOptions::new();
            fields.insert("path".into(), self.target().into());
            fields
        }
    }

    /// Open DuckDB connection
    pub struct DuckDbConnection {
        conn: ::duckdb::Connection,
    }

    impl SqlConnection for DuckDbConnection {
        fn probe(&mut self) -> Result<(), SqlError> {
            let one: i32 = self.conn.query_row("SELECT 1", [], |row| row.get(0))?;
            if one == 1 {
                Ok(())
            } else {
                Err(SqlError(format!("probe returned {one}")))
            }
        }

        fn table_exists(&mut self, table: &str) -> Result<bool, SqlError> {
            let count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?1",
                [table],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        }

        fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>, SqlError> {
            let mut stmt = self.conn.prepare(
                "SELECT column_name, data_type FROM information_schema.columns
                 WHERE table_name = ?1 ORDER BY ordinal_position",
            )?;
            let rows = stmt.query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
            let mut columns = Vec::new();
            for row in rows {
                columns.push(row?);
            }
            Ok(columns)
        }

        fn quote_identifier(&self, name: &str) -> String {
            quote(name)
        }

        fn column_type(&self, data_type: DataType) -> &'static str {
            match data_type {
                DataType::Boolean => "BOOLEAN",
                DataType::Integer => "BIGINT",
                DataType::Float => "DOUBLE",
                DataType::Text | DataType::Null => "VARCHAR",
            }
        }

        fn execute(&mut self, sql: &str) -> Result<(), SqlError> {
            self.conn.execute_batch(sql)?;
            Ok(())
        }

        fn query(&mut self, sql: &str) -> Result<Dataset, SqlError> {
            let mut stmt = self.conn.prepare(sql)?;
            let mut rows = stmt.query([])?;

            let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
            let names: Vec<String> = (0..column_count)
                .map(|i| {
                    rows.as_ref()
                        .and_then(|r| r.column_name(i).ok())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("col{i}"))
                })
                .collect();

            let mut cells: Vec<Vec<Value>> = vec![Vec::new(); column_count];
            while let Some(row) = rows.next()? {
                for (i, column) in cells.iter_mut().enumerate() {
                    let value: DuckValue = row.get(i)?;
                    column.push(from_duck(value));
                }
            }

            let columns = names
                .into_iter()
                .zip(cells)
                .map(|(name, values)| Column::new(name, values))
                .collect();
            Dataset::new(columns).map_err(|e| SqlError(e.to_string()))
        }

        fn insert_rows(&mut self, table: &str, data: &Dataset, batch_size: usize) -> Result<usize, SqlError> {
            let rows: Vec<Vec<&Value>> = data.rows().collect();
            let names: Vec<String> = data.column_names().into_iter().map(quote).collect();
            let tx = self.conn.transaction()?;
            let mut inserted = 0;
            for chunk in rows.chunks(batch_size.max(1)) {
                let sql = batch_insert_statement(&quote(table), &names, chunk.len());
                let mut stmt = tx.prepare(&sql)?;
                let values = chunk.iter().flat_map(|row| row.iter().map(|v| to_duck(v)));
                stmt.execute(::duckdb::params_from_iter(values))?;
                inserted += chunk.len();
            }
            tx.commit()?;
            Ok(inserted)
        }

        fn close(self) -> Result<(), SqlError> {
            self.conn.close().map_err(|(_, e)| SqlError::from(e))
        }
    }

    fn quote(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Multi-row insert with one placeholder group per row
    fn batch_insert_statement(table: &str, columns: &[String], rows: usize) -> String {
        let group = format!("({})", vec!["?"; columns.len()].join(", "));
        format!(
            "INSERT INTO {table} ({}) VALUES {}",
            columns.join(", "),
            vec![group; rows].join(", ")
        )
    }

    fn to_duck(value: &Value) -> DuckValue {
        match value {
            Value::Null => DuckValue::Null,
            Value::Boolean(b) => DuckValue::Boolean(*b),
            Value::Integer(i) => DuckValue::BigInt(*i),
            Value::Float(f) => DuckValue::Double(*f),
            Value::Text(s) => DuckValue::Text(s.clone()),
        }
    }

    fn from_duck(value: DuckValue) -> Value {
        match value {
            DuckValue::Null => Value::Null,
            DuckValue::Boolean(b) => Value::Boolean(b),
            DuckValue::TinyInt(n) => Value::Integer(n.into()),
            DuckValue::SmallInt(n) => Value::Integer(n.into()),
            DuckValue::Int(n) => Value::Integer(n.into()),
            DuckValue::BigInt(n) => Value::Integer(n),
            DuckValue::UTinyInt(n) => Value::Integer(n.into()),
            DuckValue::USmallInt(n) => Value::Integer(n.into()),
            DuckValue::UInt(n) => Value::Integer(n.into()),
            DuckValue::UBigInt(n) => i64::try_from(n)
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(n.to_string())),
            DuckValue::HugeInt(n) => i64::try_from(n)
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(n.to_string())),
            DuckValue::Float(f) => Value::Float(f.into()),
            DuckValue::Double(f) => Value::Float(f),
            DuckValue::Text(s) => Value::Text(s),
            other => Value::Text(format!("{other:?}")),
        }
    }
}

#[cfg(all(test, feature = "duckdb-backend"))]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::dataset::{Column, Dataset, Value};
    use crate::load::{ConnectionGuard, LoadError};

    fn people() -> Dataset {
        Dataset::from_rows(
            vec!["id".into(), "name".into(), "age".into()],
            vec![
                vec![1i64.into(), "John".into(), 25i64.into()],
                vec![2i64.into(), "Jane".into(), 30i64.into()],
                vec![3i64.into(), "Bob".into(), 35i64.into()],
            ],
        )
        .unwrap()
    }

    fn params(value: serde_json::Value) -> StageOptions {
        value.as_object().cloned().unwrap()
    }

    fn count(loader: &mut DuckDbLoader, table: &str) -> i64 {
        let result = loader
            .execute_query(&format!("SELECT COUNT(*) AS n FROM \"{table}\""))
            .unwrap()
            .unwrap();
        match result.column("n").unwrap().values[0] {
            Value::Integer(n) => n,
            ref other => panic!("unexpected count {other:?}"),
        }
    }

    #[test]
    fn test_connect_disconnect() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        assert!(!loader.is_connected());
        loader.connect().unwrap();
        loader.connect().unwrap();
        assert!(loader.is_connected());
        loader.disconnect();
        assert!(!loader.is_connected());
    }

    #[test]
    fn test_load_requires_connection() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        for data in [people(), Dataset::empty()] {
            let err = loader.load(&data, "users", &StageOptions::new()).unwrap_err();
            assert!(matches!(err, LoadError::NotConnected));
        }
        let log = loader.load_log();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|r| !r.success && r.operation == "load"));
    }

    #[test]
    fn test_table_exists_false_when_disconnected_or_absent() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        assert!(!loader.table_exists("users"));
        loader.connect().unwrap();
        assert!(!loader.table_exists("users"));
    }

    #[test]
    fn test_create_then_append_by_default() {
        let dir = TempDir::new().unwrap();
        let mut loader = DuckDbLoader::open_path(dir.path().join("out.duckdb"));
        let mut guard = ConnectionGuard::acquire(&mut loader).unwrap();

        let first = guard.load(&people(), "users", &StageOptions::new()).unwrap();
        assert!(!first.table_existed);
        assert_eq!(first.rows_loaded, 3);
        assert_eq!(first.if_exists, ExistsPolicy::Append);

        let second = guard.load(&people(), "users", &StageOptions::new()).unwrap();
        assert!(second.table_existed);
        assert_eq!(count(&mut guard, "users"), 6);

        let log = guard.load_log();
        assert_eq!(log[0].operation, "created and loaded");
        assert_eq!(log[1].operation, "loaded");
    }

    #[test]
    fn test_replace_override_per_call() {
        let dir = TempDir::new().unwrap();
        let mut loader = DuckDbLoader::open_path(dir.path().join("out.duckdb"));
        loader.connect().unwrap();
        loader.load(&people(), "users", &StageOptions::new()).unwrap();

        let two = Dataset::from_rows(
            vec!["id".into(), "name".into()],
            vec![vec![7i64.into(), "Ann".into()], vec![8i64.into(), "Ed".into()]],
        )
        .unwrap();
        let outcome = loader
            .load(&two, "users", &params(json!({"if_exists": "replace"})))
            .unwrap();
        assert!(outcome.table_existed);
        assert_eq!(outcome.rows_loaded, 2);
        assert_eq!(outcome.if_exists, ExistsPolicy::Replace);
        assert_eq!(count(&mut loader, "users"), 2);
        assert_eq!(loader.settings().if_exists, ExistsPolicy::Append);
        assert_eq!(loader.table_info("users").unwrap().columns, vec!["id", "name"]);
    }

    #[test]
    fn test_batch_size_splits_inserts() {
        let mut loader = DuckDbLoader::from_options(params(json!({"batch_size": 2}))).unwrap();
        assert_eq!(loader.settings().batch_size, 2);
        loader.connect().unwrap();

        let outcome = loader.load(&people(), "users", &StageOptions::new()).unwrap();
        assert_eq!(outcome.rows_loaded, 3);
        assert_eq!(count(&mut loader, "users"), 3);

        let outcome = loader
            .load(&people(), "users", &params(json!({"batch_size": 1})))
            .unwrap();
        assert_eq!(outcome.rows_loaded, 3);
        let names = loader
            .execute_query("SELECT name FROM users ORDER BY id, name")
            .unwrap()
            .unwrap();
        assert_eq!(
            names.column("name").unwrap().values,
            vec![
                Value::from("John"),
                Value::from("John"),
                Value::from("Jane"),
                Value::from("Jane"),
                Value::from("Bob"),
                Value::from("Bob"),
            ]
        );
    }

    #[test]
    fn test_fail_policy() {
        let options = params(json!({"if_exists": "fail"}));
        let mut loader = DuckDbLoader::from_options(options).unwrap();
        loader.connect().unwrap();
        loader.load(&people(), "users", &StageOptions::new()).unwrap();
        let err = loader.load(&people(), "users", &StageOptions::new()).unwrap_err();
        assert!(matches!(err, LoadError::TableExists(_)));
        assert!(!loader.load_log().last().unwrap().success);
    }

    #[test]
    fn test_empty_dataset_creates_table() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        loader.connect().unwrap();
        let empty = Dataset::new(vec![Column::new("id", Vec::new())]).unwrap();
        let outcome = loader.load(&empty, "empty_table", &StageOptions::new()).unwrap();
        assert_eq!(outcome.rows_loaded, 0);
        assert!(loader.table_exists("empty_table"));
    }

    #[test]
    fn test_invalid_load_params() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        loader.connect().unwrap();
        let err = loader
            .load(&people(), "users", &params(json!({"if_exists": "truncate"})))
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidParams(_)));
        let err = loader.load(&people(), " ", &StageOptions::new()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDestination(_)));
    }

    #[test]
    fn test_execute_query_read_and_write() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        assert!(matches!(
            loader.execute_query("SELECT 1"),
            Err(LoadError::NotConnected)
        ));
        loader.connect().unwrap();
        assert!(loader.execute_query("CREATE TABLE t (x BIGINT)").unwrap().is_none());
        assert!(loader.execute_query("INSERT INTO t VALUES (1), (2)").unwrap().is_none());
        let result = loader.execute_query("select x from t order by x").unwrap().unwrap();
        assert_eq!(result.column("x").unwrap().values, vec![Value::Integer(1), Value::Integer(2)]);
        assert!(matches!(
            loader.execute_query("SELECT * FROM missing_table"),
            Err(LoadError::Query(_))
        ));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let options = params(json!({"host": "localhost"}));
        assert!(DuckDbLoader::from_options(options).is_err());
    }

    #[test]
    fn test_metadata_and_log_clear() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        loader.connect().unwrap();
        loader.load(&people(), "users", &StageOptions::new()).unwrap();
        let metadata = loader.metadata();
        assert_eq!(metadata["loader_type"], json!("duckdb"));
        assert_eq!(metadata["is_connected"], json!(true));
        assert_eq!(metadata["load_operations_count"], json!(1));
        assert_eq!(metadata["if_exists_mode"], json!("append"));

        loader.clear_load_log();
        assert!(loader.load_log().is_empty());
    }

    #[test]
    fn test_guard_disconnects_on_error_path() {
        let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
        let result: Result<(), LoadError> = (|| {
            let mut guard = ConnectionGuard::acquire(&mut loader)?;
            guard.load(&people(), "", &StageOptions::new())?;
            Ok(())
        })();
        assert!(result.is_err());
        assert!(!loader.is_connected());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_disconnect_is_idempotent(ops in prop::collection::vec(any::<bool>(), 0..12)) {
            let mut loader = DuckDbLoader::from_options(StageOptions::new()).unwrap();
            for connect_first in ops {
                if connect_first {
                    loader.connect().unwrap();
                }
                loader.disconnect();
                prop_assert!(!loader.is_connected());
                loader.disconnect();
                prop_assert!(!loader.is_connected());
            }
        }
    }
}
