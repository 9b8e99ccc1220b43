//! Configuration module for filehost.

use serde::Deserialize;
use std::path::Path;

use crate::file::{AdmissionMode, QuotaPolicy};
use crate::{FilehostError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins (empty allows any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/filehost.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory where uploaded files are written.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Total storage capacity in (binary) gigabytes.
    #[serde(default = "default_max_storage_gb")]
    pub max_storage_gb: u64,
    /// How uploads are admitted against the quota.
    #[serde(default)]
    pub admission: AdmissionMode,
}

fn default_storage_path() -> String {
    "data/uploads".to_string()
}

fn default_max_storage_gb() -> u64 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_storage_gb: default_max_storage_gb(),
            admission: AdmissionMode::default(),
        }
    }
}

impl StorageConfig {
    /// Build the quota policy described by this section.
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy::from_gigabytes(self.max_storage_gb, self.admission)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filehost.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FilehostError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FilehostError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEHOST_STORAGE_PATH`: storage directory
    /// - `FILEHOST_MAX_STORAGE_GB`: capacity in gigabytes (ignored if not a number)
    /// - `FILEHOST_DATABASE_PATH`: SQLite database file
    ///
    /// Invalid values are logged, so call this after logging is set up.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FILEHOST_STORAGE_PATH") {
            if !path.is_empty() {
                self.storage.path = path;
            }
        }

        if let Some(gb) = lookup("FILEHOST_MAX_STORAGE_GB") {
            match gb.trim().parse::<u64>() {
                Ok(gb) => self.storage.max_storage_gb = gb,
                Err(_) => tracing::warn!(value = %gb, "Ignoring invalid FILEHOST_MAX_STORAGE_GB"),
            }
        }

        if let Some(path) = lookup("FILEHOST_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(FilehostError::Config(
                "storage.path must not be empty".to_string(),
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(FilehostError::Config(
                "database.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.cors_origins.is_empty());

        assert_eq!(config.database.path, "data/filehost.db");

        assert_eq!(config.storage.path, "data/uploads");
        assert_eq!(config.storage.max_storage_gb, 10);
        assert_eq!(config.storage.admission, AdmissionMode::Snapshot);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/filehost.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
cors_origins = ["http://localhost:5173"]

[database]
path = "/var/lib/filehost/files.db"

[storage]
path = "/srv/uploads"
max_storage_gb = 50
admission = "reserved"

[logging]
level = "debug"
file = "/var/log/filehost.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.database.path, "/var/lib/filehost/files.db");
        assert_eq!(config.storage.path, "/srv/uploads");
        assert_eq!(config.storage.max_storage_gb, 50);
        assert_eq!(config.storage.admission, AdmissionMode::Reserved);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "/var/log/filehost.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
max_storage_gb = 2
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.max_storage_gb, 2);
        assert_eq!(config.storage.path, "data/uploads");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.max_storage_gb, 10);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("[storage]\nmax_storage_gb = \"lots\"");
        assert!(matches!(result, Err(FilehostError::Config(_))));
    }

    #[test]
    fn test_parse_unknown_admission_mode() {
        let result = Config::parse("[storage]\nadmission = \"optimistic\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(FilehostError::Io(_))));
    }

    #[test]
    fn test_quota_policy_from_storage_config() {
        let storage = StorageConfig {
            path: "x".to_string(),
            max_storage_gb: 3,
            admission: AdmissionMode::Reserved,
        };
        let policy = storage.quota_policy();
        assert_eq!(policy.capacity_bytes(), 3 * 1024 * 1024 * 1024);
        assert_eq!(policy.admission(), AdmissionMode::Reserved);
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_storage_path() {
        let mut config = Config::default();
        config.storage.path = "  ".to_string();
        assert!(matches!(config.validate(), Err(FilehostError::Config(_))));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(config.validate(), Err(FilehostError::Config(_))));
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("FILEHOST_STORAGE_PATH", "/srv/files"),
            ("FILEHOST_MAX_STORAGE_GB", " 25 "),
            ("FILEHOST_DATABASE_PATH", "/srv/files.db"),
        ]));

        assert_eq!(config.storage.path, "/srv/files");
        assert_eq!(config.storage.max_storage_gb, 25);
        assert_eq!(config.database.path, "/srv/files.db");
    }

    #[test]
    fn test_invalid_and_empty_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("FILEHOST_STORAGE_PATH", ""),
            ("FILEHOST_MAX_STORAGE_GB", "lots"),
        ]));

        assert_eq!(config.storage.path, "data/uploads");
        assert_eq!(config.storage.max_storage_gb, 10);
        assert_eq!(config.database.path, "data/filehost.db");
    }
}
