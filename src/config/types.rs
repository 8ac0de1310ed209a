// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure, mirrors the JSON config file
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bucket to list and download from
    pub bucket_name: String,
    /// Region the bucket lives in
    pub region: String,
    /// Listen port, kept as a numeric string in the file
    pub server_port: String,
    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,
    /// Cache directory, also the URL prefix of the download route
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Page cap for object listing
    #[serde(default = "default_max_keys")]
    pub max_keys: i32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            access_log: default_true(),
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PerformanceConfig {
    /// Upper bound for serving one connection, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            keep_alive: default_true(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_host() -> String {
    "0.0.0.0".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_cache_dir() -> String {
    super::DEFAULT_CACHE_DIR.to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_keys() -> i32 {
    super::MAX_KEYS_LIMIT
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_request_timeout() -> u64 {
    30
}
