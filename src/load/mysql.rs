//! MySQL / MariaDB destination

use serde::{Deserialize, Serialize};

use super::sql::LoadSettings;
use super::{ExistsPolicy, Loader};
use crate::config::{ConfigurationError, StageOptions, parse_settings};

/// Keys every `mysql` loader configuration must carry
pub const REQUIRED_MYSQL_KEYS: [&str; 5] = ["host", "port", "user", "password", "database"];

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_batch_size() -> usize {
    LoadSettings::default().batch_size
}

/// MySQL loader options (database section merged with loader options)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u32,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub if_exists: ExistsPolicy,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("if_exists", &self.if_exists)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl MySqlSettings {
    /// Parse loader options, reporting every missing connection key at once
    pub fn from_options(options: &StageOptions) -> Result<Self, ConfigurationError> {
        let missing: Vec<String> = REQUIRED_MYSQL_KEYS
            .iter()
            .filter(|key| !options.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingFields {
                stage: "MySQL".to_string(),
                fields: missing,
            });
        }

        let settings: Self = parse_settings("MySQL loader", options)?;
        if !(1..=65535).contains(&settings.port) {
            return Err(ConfigurationError::OutOfRange {
                field: "port".to_string(),
                value: i64::from(settings.port),
                min: 1,
                max: 65535,
            });
        }
        Ok(settings)
    }

    /// Connection target without credentials
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            if_exists: self.if_exists,
            batch_size: self.batch_size,
        }
    }
}

/// Registry constructor for the `mysql` loader type
pub(crate) fn build(options: StageOptions) -> Result<Box<dyn Loader>, ConfigurationError> {
    let settings = MySqlSettings::from_options(&options)?;
    #[cfg(feature = "mysql")]
    {
        Ok(Box::new(MySqlLoader::from_settings(options, settings)))
    }
    #[cfg(not(feature = "mysql"))]
    {
        tracing::error!(endpoint = %settings.target(), "MySQL loader requested but not compiled in");
        Err(ConfigurationError::FeatureDisabled { feature: "mysql" })
    }
}

#[cfg(feature = "mysql")]
pub use backend::{MySqlBackend, MySqlConnection, MySqlLoader};

#[cfg(feature = "mysql")]
mod backend {
    use ::mysql::prelude::Queryable;
    use ::mysql::{Conn, OptsBuilder, Params, TxOpts, Value as MyValue};

    use super::MySqlSettings;
    use crate::config::{ConfigurationError, StageOptions};
    use crate::dataset::{Column, DataType, Dataset, Value, infer_from_text};
    use crate::load::sql::{SqlBackend, SqlConnection, SqlError, SqlLoader};

    /// Loader writing into a MySQL database
    pub type MySqlLoader = SqlLoader<MySqlBackend>;

    impl From<::mysql::Error> for SqlError {
        fn from(e: ::mysql::Error) -> Self {
            SqlError(e.to_string())
        }
    }

    impl MySqlLoader {
        /// Build from merged `mysql` loader options
        pub fn from_options(options: StageOptions) -> Result<Self, ConfigurationError> {
            let settings = MySqlSettings::from_options(&options)?;
            Ok(Self::from_settings(options, settings))
        }

        pub(crate) fn from_settings(options: StageOptions, settings: MySqlSettings) -> Self {
            let load = settings.load_settings();
            SqlLoader::new(MySqlBackend { settings }, options, load)
        }
    }

    /// Opens MySQL connections
    #[derive(Debug, Clone)]
    pub struct MySqlBackend {
        settings: MySqlSettings,
    }

    impl SqlBackend for MySqlBackend {
        type Connection = MySqlConnection;

        fn kind(&self) -> &'static str {
            "mysql"
        }

        fn target(&self) -> String {
            self.settings.target()
        }

        fn open(&self) -> Result<Self::Connection, SqlError> {
            let s = &self.settings;
            let port = u16::try_from(s.port).map_err(|_| SqlError(format!("invalid port {}", s.port)))?;
            let opts = OptsBuilder::new()
                .ip_or_hostname(Some(s.host.clone()))
                .tcp_port(port)
                .user(Some(s.user.clone()))
                .pass(Some(s.password.clone()))
                .db_name(Some(s.database.clone()))
                .init(vec![format!("SET NAMES {}", s.charset)]);
            let conn = Conn::new(opts)?;
            Ok(MySqlConnection { conn })
        }

        fn describe(&self) -> StageOptions {
            let s = &self.settings;
            let mut fields = StageOptions::new();
            fields.insert("host".into(), s.host.clone().into());
            fields.insert("port".into(), s.port.into());
            fields.insert("database".into(), s.database.clone().into());
            fields.insert("user".into(), s.user.clone().into());
            fields.insert("charset".into(), s.charset.clone().into());
            fields
        }
    }

    /// Open MySQL connection
    pub struct MySqlConnection {
        conn: Conn,
    }

    impl SqlConnection for MySqlConnection {
        fn probe(&mut self) -> Result<(), SqlError> {
            self.conn.query_drop("SELECT 1")?;
            Ok(())
        }

        fn table_exists(&mut self, table: &str) -> Result<bool, SqlError> {
            let count: Option<i64> = self.conn.exec_first(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
                (table,),
            )?;
            Ok(count.unwrap_or(0) > 0)
        }

        fn table_columns(&mut self, table: &str) -> Result<Vec<(String, String)>, SqlError> {
            let columns = self.conn.exec_map(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
                (table,),
                |(name, kind): (String, String)| (name, kind),
            )?;
            Ok(columns)
        }

        fn quote_identifier(&self, name: &str) -> String {
            format!("`{}`", name.replace('`', "``"))
        }

        fn column_type(&self, data_type: DataType) -> &'static str {
            match data_type {
                DataType::Boolean => "BOOLEAN",
                DataType::Integer => "BIGINT",
                DataType::Float => "DOUBLE",
                DataType::Text | DataType::Null => "TEXT",
            }
        }

        fn execute(&mut self, sql: &str) -> Result<(), SqlError> {
            self.conn.query_drop(sql)?;
            Ok(())
        }

        fn query(&mut self, sql: &str) -> Result<Dataset, SqlError> {
            let result = self.conn.query_iter(sql)?;
            let names: Vec<String> = result
                .columns()
                .as_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect();

            let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
            for row in result {
                let row = row?;
                for (i, column) in cells.iter_mut().enumerate() {
                    column.push(row.as_ref(i).and_then(cell_text));
                }
            }

            let columns = names
                .into_iter()
                .zip(cells)
                .map(|(name, raw)| {
                    let (data_type, values) = infer_from_text(raw);
                    Column::with_type(name, data_type, values)
                })
                .collect();
            Dataset::new(columns).map_err(|e| SqlError(e.to_string()))
        }

        fn insert_rows(&mut self, table: &str, data: &Dataset, batch_size: usize) -> Result<usize, SqlError> {
            let stmt = self.insert_statement(table, data);
            let rows: Vec<Vec<MyValue>> = data
                .rows()
                .map(|row| row.into_iter().map(to_mysql).collect())
                .collect();

            let mut tx = self.conn.start_transaction(TxOpts::default())?;
            for chunk in rows.chunks(batch_size) {
                tx.exec_batch(stmt.as_str(), chunk.iter().map(|row| Params::Positional(row.clone())))?;
            }
            tx.commit()?;
            Ok(rows.len())
        }

        fn close(self) -> Result<(), SqlError> {
            drop(self.conn);
            Ok(())
        }
    }

    fn to_mysql(value: &Value) -> MyValue {
        match value {
            Value::Null => MyValue::NULL,
            Value::Boolean(b) => MyValue::Int(i64::from(*b)),
            Value::Integer(i) => MyValue::Int(*i),
            Value::Float(f) => MyValue::Double(*f),
            Value::Text(s) => MyValue::Bytes(s.clone().into_bytes()),
        }
    }

    fn cell_text(value: &MyValue) -> Option<String> {
        match value {
            MyValue::NULL => None,
            MyValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            MyValue::Int(n) => Some(n.to_string()),
            MyValue::UInt(n) => Some(n.to_string()),
            MyValue::Float(f) => Some(f.to_string()),
            MyValue::Double(f) => Some(f.to_string()),
            MyValue::Date(y, mo, d, h, mi, s, _) => {
                Some(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
            }
            MyValue::Time(neg, days, h, mi, s, _) => {
                let sign = if *neg { "-" } else { "" };
                let hours = u32::from(*h) + days * 24;
                Some(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
            }
        }
    }
}
