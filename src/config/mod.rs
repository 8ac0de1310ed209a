// Configuration module entry point
// Loads the JSON config file once at startup and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

pub use state::AppState;
pub use types::{Config, LoggingConfig, PerformanceConfig};

/// Config file used when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default cache directory name (also the download URL prefix)
pub const DEFAULT_CACHE_DIR: &str = "download";

/// Largest page the store returns for a single list call
pub const MAX_KEYS_LIMIT: i32 = 1000;

/// Configuration loading failure, always fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// The file must exist. Environment variables are not consulted.
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = config_path.as_ref().to_string_lossy().into_owned();
        let settings = config::Config::builder()
            .add_source(config::File::new(&path, config::FileFormat::Json).required(true))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check field values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket_name must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".into()));
        }
        self.port()?;
        if !(1..=MAX_KEYS_LIMIT).contains(&self.max_keys) {
            return Err(ConfigError::Invalid(format!(
                "max_keys must be between 1 and {MAX_KEYS_LIMIT}, got {}",
                self.max_keys
            )));
        }
        let dir = self.cache_dir.as_str();
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains('/') || dir.contains('\\') {
            return Err(ConfigError::Invalid(format!(
                "cache_dir must be a single directory name, got '{dir}'"
            )));
        }
        Ok(())
    }

    /// Listen port parsed from its string form
    pub fn port(&self) -> Result<u16, ConfigError> {
        self.server_port.trim().parse().map_err(|e| {
            ConfigError::Invalid(format!("invalid server_port '{}': {e}", self.server_port))
        })
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let port = self.port()?;
        format!("{}:{port}", self.host)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("Invalid address: {e}")))
    }

    /// URL prefix of the download route, e.g. `/download/`
    pub fn download_prefix(&self) -> String {
        format!("/{}/", self.cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(
            r#"{"bucket_name": "b1", "region": "eu-central-1", "server_port": "8080"}"#,
        );
        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.bucket_name, "b1");
        assert_eq!(cfg.region, "eu-central-1");
        assert_eq!(cfg.port().unwrap(), 8080);
        assert_eq!(cfg.cache_dir, DEFAULT_CACHE_DIR);
        assert_eq!(cfg.max_keys, MAX_KEYS_LIMIT);
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.performance.request_timeout, 30);
        assert_eq!(cfg.download_prefix(), "/download/");
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"{
                "bucket_name": "b1",
                "region": "us-west-2",
                "server_port": "9000",
                "host": "127.0.0.1",
                "cache_dir": "objects",
                "max_keys": 2,
                "logging": {"access_log": false, "access_log_format": "json"},
                "performance": {"request_timeout": 5, "keep_alive": false}
            }"#,
        );
        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.max_keys, 2);
        assert_eq!(cfg.download_prefix(), "/objects/");
        assert!(!cfg.logging.access_log);
        assert!(!cfg.performance.keep_alive);
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let file = write_config(r#"{"bucket_name": "b1", "region": "#);
        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_missing_field_is_error() {
        let file = write_config(r#"{"bucket_name": "b1", "server_port": "8080"}"#);
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config(
            r#"{"bucket_name": "b1", "region": "eu-central-1", "server_port": "http"}"#,
        );
        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Invalid(_))));

        let file = write_config(
            r#"{"bucket_name": "b1", "region": "eu-central-1", "server_port": "8080", "max_keys": 0}"#,
        );
        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Invalid(_))));

        let file = write_config(
            r#"{"bucket_name": "b1", "region": "eu-central-1", "server_port": "8080", "cache_dir": "a/b"}"#,
        );
        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Invalid(_))));
    }
}
