// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub livereload: LiveReloadConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

/// Listening endpoint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// LiveReload protocol settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LiveReloadConfig {
    /// Bootstrap script served at `/livereload.js`, read once at startup
    pub asset_path: String,
    /// Value of `serverName` in the hello message
    pub server_name: String,
    /// Period of the self-test reload, in seconds
    pub self_test_interval_secs: u64,
    /// Path named by the self-test reload
    pub self_test_path: String,
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    /// Upper bound in seconds on the HTTP phase of a connection
    pub handshake_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
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

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}
