//! Database connection section

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ConfigurationError;
use super::stage::StageOptions;

fn default_charset() -> String {
    "utf8mb4".to_string()
}

/// Connection settings for server-backed loaders
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Server host name
    pub host: String,
    /// Server port (1-65535)
    pub port: u32,
    /// User name
    pub user: String,
    /// Password
    pub password: String,
    /// Database (schema) name
    pub database: String,
    /// Connection character set
    #[serde(default = "default_charset")]
    pub charset: String,
}

impl DatabaseConfig {
    /// Create a validated database section
    pub fn new(
        host: impl Into<String>,
        port: u32,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            charset: default_charset(),
        }
        .validated()
    }

    /// Set the connection character set
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Check the port range and trim the text fields
    pub fn validated(mut self) -> Result<Self, ConfigurationError> {
        if !(1..=65535).contains(&self.port) {
            return Err(ConfigurationError::OutOfRange {
                field: "port".to_string(),
                value: i64::from(self.port),
                min: 1,
                max: 65535,
            });
        }
        for (field, value) in [
            ("host", &mut self.host),
            ("user", &mut self.user),
            ("database", &mut self.database),
        ] {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                return Err(ConfigurationError::Empty(format!("Database {field}")));
            }
            *value = trimmed;
        }
        if self.charset.trim().is_empty() {
            self.charset = default_charset();
        }
        Ok(self)
    }

    /// Option map merged into server-backed loader options
    pub fn to_options(&self) -> StageOptions {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => StageOptions::new(),
        }
    }

    /// Option map with the password masked
    pub fn redacted_options(&self) -> StageOptions {
        let mut options = self.to_options();
        options.insert("password".to_string(), serde_json::json!("***"));
        options
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_fields() {
        let db = DatabaseConfig::new(" localhost ", 3306, "root", "secret", " test_db").unwrap();
        assert_eq!(db.host, "localhost");
        assert_eq!(db.database, "test_db");
        assert_eq!(db.charset, "utf8mb4");
    }

    #[test]
    fn test_port_range() {
        assert!(matches!(
            DatabaseConfig::new("h", 0, "u", "p", "d"),
            Err(ConfigurationError::OutOfRange { value: 0, .. })
        ));
        assert!(DatabaseConfig::new("h", 65536, "u", "p", "d").is_err());
        assert!(DatabaseConfig::new("h", 65535, "u", "p", "d").is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(matches!(
            DatabaseConfig::new("  ", 3306, "u", "p", "d"),
            Err(ConfigurationError::Empty(_))
        ));
    }

    #[test]
    fn test_password_redacted() {
        let db = DatabaseConfig::new("h", 3306, "u", "hunter2", "d").unwrap();
        assert!(!format!("{db:?}").contains("hunter2"));
        assert_eq!(db.redacted_options()["password"], serde_json::json!("***"));
        assert_eq!(db.to_options()["password"], serde_json::json!("hunter2"));
    }
}
