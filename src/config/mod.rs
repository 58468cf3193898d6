// Configuration module entry point
// Loads layered configuration: defaults, optional file, environment

mod types;

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ServerError;

// Re-export public types
pub use types::{Config, LiveReloadConfig, LoggingConfig, PerformanceConfig, ServerConfig};

pub const DEFAULT_CONFIG_NAME: &str = "livereload";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 35729;

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional. Environment variables prefixed with `LIVERELOAD`
    /// override it, using `__` between section and key
    /// (e.g. `LIVERELOAD_SERVER__PORT=35730`).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("LIVERELOAD").separator("__"))
            .set_default("server.host", DEFAULT_HOST)?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("livereload.asset_path", "content/livereload.js")?
            .set_default("livereload.server_name", "jekyll")?
            .set_default("livereload.self_test_interval_secs", 5)?
            .set_default("livereload.self_test_path", "/test.html")?
            .set_default("performance.handshake_timeout", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|source| ServerError::InvalidAddress { addr, source })
    }

    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.performance.handshake_timeout)
    }

    pub const fn self_test_interval(&self) -> Duration {
        Duration::from_secs(self.livereload.self_test_interval_secs)
    }
}
