//! Application configuration management.
//!
//! Handles loading, saving, and accessing application configuration including
//! the server address, real-time channel tuning, and logging preferences.
//! Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{SdError, SdResult};
use crate::platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Real-time room channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server origin (e.g., "https://live.example.com").
    #[serde(default)]
    pub address: String,

    /// REST API path prefix appended to the address.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,
}

/// Real-time room channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Maximum consecutive reconnection attempts.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnection attempts in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Keep-alive probe interval in milliseconds.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,

    /// Timeout for a single open attempt in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Path of the room endpoint; the room id is appended.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_path() -> String {
    constants::DEFAULT_API_PATH.to_string()
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_max_reconnect_attempts() -> u32 {
    constants::DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_interval() -> u64 {
    constants::DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_keepalive_interval() -> u64 {
    constants::DEFAULT_KEEPALIVE_INTERVAL_MS
}

fn default_connect_timeout() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_endpoint_path() -> String {
    constants::DEFAULT_ROOM_ENDPOINT_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            api_path: default_api_path(),
            api_timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval(),
            keepalive_interval_ms: default_keepalive_interval(),
            connect_timeout_ms: default_connect_timeout(),
            endpoint_path: default_endpoint_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl ServerConfig {
    /// Full REST API root, e.g. "https://live.example.com/api".
    pub fn api_root(&self) -> String {
        let address = AppConfig::sanitize_server_address(&self.address);
        let path = self.api_path.trim_end_matches('/');
        if path.is_empty() {
            address
        } else if path.starts_with('/') {
            format!("{address}{path}")
        } else {
            format!("{address}/{path}")
        }
    }

    /// Request timeout as a Duration.
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }
}

impl RealtimeConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> SdResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> SdResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> SdResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> SdResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SdError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> SdResult<PathBuf> {
        let config_dir = platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> SdResult<PathBuf> {
        if self.logging.directory.is_empty() {
            let data_dir = platform::data_dir()?;
            Ok(data_dir.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether the server connection is configured.
    pub fn is_server_configured(&self) -> bool {
        !self.server.address.is_empty()
    }

    /// Sanitize and normalize a server address.
    ///
    /// Ensures the address has a scheme and strips trailing slashes. Bare
    /// tunnel hosts (ngrok) are assumed to be served over https.
    pub fn sanitize_server_address(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.contains("ngrok") {
            format!("https://{trimmed}")
        } else {
            format!("http://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across tasks.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> SdResult<()> {
        let config = self.inner.read().await;
        config.save_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.api_timeout_ms, 10_000);
        assert_eq!(config.realtime.max_reconnect_attempts, 5);
        assert_eq!(config.realtime.reconnect_interval(), Duration::from_secs(3));
        assert_eq!(config.realtime.keepalive_interval(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(!config.is_server_configured());
    }

    #[test]
    fn test_sanitize_server_address() {
        assert_eq!(
            AppConfig::sanitize_server_address("abc123.ngrok.io"),
            "https://abc123.ngrok.io"
        );
        assert_eq!(
            AppConfig::sanitize_server_address("http://192.168.1.100:8080/"),
            "http://192.168.1.100:8080"
        );
        assert_eq!(
            AppConfig::sanitize_server_address("  \"https://example.com/\"  "),
            "https://example.com"
        );
        assert_eq!(
            AppConfig::sanitize_server_address("localhost:8080"),
            "http://localhost:8080"
        );
        assert_eq!(AppConfig::sanitize_server_address("   "), "");
    }

    #[test]
    fn test_api_root() {
        let mut server = ServerConfig {
            address: "localhost:8080/".into(),
            ..ServerConfig::default()
        };
        assert_eq!(server.api_root(), "http://localhost:8080/api");

        server.api_path = "v2/".into();
        assert_eq!(server.api_root(), "http://localhost:8080/v2");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            address = "https://live.example.com"

            [realtime]
            max_reconnect_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.realtime.max_reconnect_attempts, 2);
        assert_eq!(config.realtime.reconnect_interval_ms, 3_000);
        assert_eq!(config.realtime.endpoint_path, "/ws/live-room");
        assert_eq!(config.server.api_path, "/api");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.server.address = "https://live.example.com".into();
        config.realtime.keepalive_interval_ms = 5_000;
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.server.address, "https://live.example.com");
        assert_eq!(loaded.realtime.keepalive_interval_ms, 5_000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\naddress = ").unwrap();
        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, SdError::Config(_)));
    }
}
