use crate::core::{DataReaderError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// The configured level as a tracing level.
    pub fn max_level(&self) -> Result<tracing::Level> {
        self.level
            .parse()
            .map_err(|_| DataReaderError::Config(format!("unknown log level '{}'", self.level)))
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// A named connection profile, selected by its `driver` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Sqlite(SqliteConfig),
    Postgres(PostgresConfig),
    Mssql(MssqlConfig),
}

/// SQLite profile: a database file, or `:memory:`.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    pub path: String,
}

/// Postgres profile. When `url` is set it takes precedence over the
/// individual fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    pub password: Option<String>,
    #[serde(default)]
    pub database: String,
    pub url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

/// SQL Server profile. A non-empty `instance` is resolved through the SQL
/// Server Browser and wins over `port`; `ado_string` overrides everything.
#[derive(Debug, Clone, Deserialize)]
pub struct MssqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    pub password: Option<String>,
    #[serde(default)]
    pub database: String,
    pub instance: Option<String>,
    #[serde(default)]
    pub trust_cert: bool,
    #[serde(default = "default_mssql_timeout")]
    pub connect_timeout_secs: u64,
    pub ado_string: Option<String>,
}

impl Default for MssqlConfig {
    fn default() -> Self {
        MssqlConfig {
            host: default_host(),
            port: None,
            user: String::new(),
            password: None,
            database: String::new(),
            instance: None,
            trust_cert: false,
            connect_timeout_secs: default_mssql_timeout(),
            ado_string: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_mssql_timeout() -> u64 {
    60
}

impl Config {
    /// Looks up a connection profile by name.
    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig> {
        self.connections.get(name).ok_or_else(|| {
            DataReaderError::Config(format!("no connection profile named '{}'", name))
        })
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| DataReaderError::Config(e.to_string()))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = datareader::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// `<config dir>/datareader/config.toml`, e.g. `~/.config/datareader/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("datareader").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[logging]
level = "debug"

[connections.local]
driver = "sqlite"
path = "app.db"

[connections.warehouse]
driver = "postgres"
host = "db.internal"
port = 5432
user = "app"
password = "secret"
database = "warehouse"

[connections.reporting]
driver = "mssql"
user = "report_user"
password = "secret"
database = "local"
instance = "MSSQL2017"
trust_cert = true
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = parse_config(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(config.connections.len(), 3);

        match config.connection("local").unwrap() {
            ConnectionConfig::Sqlite(sqlite) => assert_eq!(sqlite.path, "app.db"),
            other => panic!("Expected sqlite profile, got {:?}", other),
        }

        match config.connection("warehouse").unwrap() {
            ConnectionConfig::Postgres(pg) => {
                assert_eq!(pg.host, "db.internal");
                assert_eq!(pg.port, Some(5432));
                assert_eq!(pg.password.as_deref(), Some("secret"));
                assert!(pg.url.is_none());
            }
            other => panic!("Expected postgres profile, got {:?}", other),
        }

        match config.connection("reporting").unwrap() {
            ConnectionConfig::Mssql(mssql) => {
                assert_eq!(mssql.host, "localhost");
                assert_eq!(mssql.instance.as_deref(), Some("MSSQL2017"));
                assert!(mssql.trust_cert);
                assert_eq!(mssql.connect_timeout_secs, 60);
            }
            other => panic!("Expected mssql profile, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_unknown_profile_and_driver() {
        let config = parse_config(SAMPLE_CONFIG).unwrap();
        assert!(matches!(
            config.connection("missing"),
            Err(DataReaderError::Config(_))
        ));

        let bad = parse_config("[connections.x]\ndriver = \"oracle\"\n");
        assert!(matches!(bad, Err(DataReaderError::Config(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let config = parse_config("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(config.logging.max_level().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.connection("local").is_ok());

        assert!(matches!(
            load_config("/nonexistent/datareader.toml"),
            Err(DataReaderError::Io(_))
        ));
    }
}
