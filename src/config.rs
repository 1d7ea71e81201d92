//! Configuration module for cabinet.

use serde::Deserialize;
use std::path::Path;

use crate::{CabinetError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/cabinet.db".to_string()
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
pub struct FilesConfig {
    /// Directory where file contents are stored.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_storage_path() -> String {
    "data/files".to_string()
}

fn default_max_upload_size() -> u64 {
    50
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl FilesConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cabinet.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins. Empty means any origin without credentials.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key.
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
    /// Refresh token expiry in days.
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_token_expiry_days: u64,
    /// Rate limit for the login endpoint (requests per minute per IP).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8082
}

fn default_jwt_access_expiry() -> u64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiry() -> u64 {
    7
}

fn default_login_rate_limit() -> u32 {
    10
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
            jwt_refresh_token_expiry_days: default_jwt_refresh_expiry(),
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

/// Initial administrator account, created when the user table is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Username of the bootstrap administrator.
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Password of the bootstrap administrator.
    #[serde(default)]
    pub password: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Bootstrap administrator.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CabinetError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CabinetError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CABINET_JWT_SECRET`: JWT secret key
    /// - `CABINET_ADMIN_PASSWORD`: bootstrap administrator password
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("CABINET_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
        if let Ok(password) = std::env::var("CABINET_ADMIN_PASSWORD") {
            if !password.is_empty() {
                self.admin.password = password;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the JWT secret is missing or the upload limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(CabinetError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via the CABINET_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.files.max_upload_size_mb == 0 {
            return Err(CabinetError::Config(
                "files.max_upload_size_mb must be greater than zero".to_string(),
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

        assert_eq!(config.database.path, "data/cabinet.db");

        assert_eq!(config.files.storage_path, "data/files");
        assert_eq!(config.files.max_upload_size_mb, 50);
        assert_eq!(config.files.max_upload_size_bytes(), 50 * 1024 * 1024);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/cabinet.log");

        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8082);
        assert!(config.web.cors_origins.is_empty());
        assert!(config.web.jwt_secret.is_empty());
        assert_eq!(config.web.jwt_access_token_expiry_secs, 900);
        assert_eq!(config.web.jwt_refresh_token_expiry_days, 7);
        assert_eq!(config.web.login_rate_limit, 10);

        assert_eq!(config.admin.username, "admin");
        assert!(config.admin.password.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
path = "custom/db.sqlite"

[files]
storage_path = "/srv/cabinet"
max_upload_size_mb = 200

[logging]
level = "debug"
file = "custom/cabinet.log"

[web]
host = "127.0.0.1"
port = 9000
cors_origins = ["http://localhost:4200"]
jwt_secret = "s3cret"
jwt_access_token_expiry_secs = 600
jwt_refresh_token_expiry_days = 30
login_rate_limit = 3

[admin]
username = "root"
password = "changeme123"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.database.path, "custom/db.sqlite");
        assert_eq!(config.files.storage_path, "/srv/cabinet");
        assert_eq!(config.files.max_upload_size_mb, 200);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/cabinet.log");
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.cors_origins, vec!["http://localhost:4200"]);
        assert_eq!(config.web.jwt_secret, "s3cret");
        assert_eq!(config.web.jwt_access_token_expiry_secs, 600);
        assert_eq!(config.web.jwt_refresh_token_expiry_days, 30);
        assert_eq!(config.web.login_rate_limit, 3);
        assert_eq!(config.admin.username, "root");
        assert_eq!(config.admin.password, "changeme123");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[web]
port = 3000
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.database.path, "data/cabinet.db");
        assert_eq!(config.files.max_upload_size_mb, 50);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.web.port, 8082);
        assert_eq!(config.admin.username, "admin");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("[web]\nport = \"not a number\"");
        assert!(matches!(result, Err(CabinetError::Config(_))));
    }

    #[test]
    fn test_validate_requires_jwt_secret() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_upload_limit() {
        let mut config = Config::default();
        config.web.jwt_secret = "secret".to_string();
        config.files.max_upload_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"x.db\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, "x.db");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/cabinet/config.toml");
        assert!(matches!(result, Err(CabinetError::Io(_))));
    }
}
