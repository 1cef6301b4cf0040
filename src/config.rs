//! Run configuration, handed to [`crate::pipeline::run`] by the caller.

use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the trip `*.csv` files.
    pub input_dir: PathBuf,
    /// Directory replaced by the file sink on every run.
    pub output_dir: PathBuf,
    /// Rows printed by each display step, 0 disables display.
    pub show_rows: usize,
    /// `None` runs without the database sink.
    pub database: Option<DatabaseConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./data"),
            output_dir: PathBuf::from("./output"),
            show_rows: 100,
            database: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub table: String,
    pub user: String,
    pub password: String,
    /// Connect over TLS with the platform's trust store.
    pub ssl: bool,
}

impl DatabaseConfig {
    /// Builds a config from optional settings, naming the first one missing.
    pub fn from_parts(
        host: Option<String>,
        port: u16,
        database: Option<String>,
        table: Option<String>,
        user: Option<String>,
        password: Option<String>,
        ssl: bool,
    ) -> Result<Self, ConfigError> {
        fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingDatabaseSetting(name))
        }

        let config = Self {
            host: required(host, "mysql-host")?,
            port,
            database: required(database, "mysql-database")?,
            table: required(table, "mysql-table")?,
            user: required(user, "mysql-user")?,
            password: password.unwrap_or_default(),
            ssl,
        };
        validate_identifier("mysql-database", &config.database)?;
        validate_identifier("mysql-table", &config.table)?;
        Ok(config)
    }

    /// `database.table`, quoted for MySQL.
    pub fn qualified_table(&self) -> String {
        format!("`{}`.`{}`", self.database, self.table)
    }

    /// Connection target without credentials.
    pub fn target(&self) -> String {
        format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("table", &self.table)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl", &self.ssl)
            .finish()
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let valid = value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}
