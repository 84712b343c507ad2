//! Configuration for the sync client.
//!
//! Can be built in code or loaded from a TOML file:
//!
//! ```toml
//! user_id = "@bot:example.org"
//! timeout_ms = 30000
//! set_presence = "online"
//! retry_delay_secs = 10
//! ```

use roomsync_types::{Cursor, FilterId, SyncRequest, UserId, DEFAULT_TIMEOUT_MS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for [`SyncClient`](crate::SyncClient).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Account to sync.
    pub user_id: UserId,
    /// Long-poll timeout passed to the server (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Request full state on every fetch (default: false).
    #[serde(default)]
    pub full_state: bool,
    /// Presence to advertise while syncing.
    #[serde(default)]
    pub set_presence: Option<String>,
    /// Delay between retries for the default failure policy (default: 10).
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retry_delay_secs() -> u64 {
    10
}

impl SyncConfig {
    /// Create a configuration with defaults for `user_id`.
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: UserId::new(user_id),
            timeout_ms: default_timeout_ms(),
            full_state: false,
            set_presence: None,
            retry_delay_secs: default_retry_delay_secs(),
        }
    }

    /// Set the long-poll timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the presence to advertise.
    pub fn with_presence(mut self, presence: &str) -> Self {
        self.set_presence = Some(presence.to_string());
        self
    }

    /// Set the default retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_secs = delay.as_secs();
        self
    }

    /// The default retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Build the request for one fetch.
    pub fn request(&self, since: Cursor, filter: Option<FilterId>) -> SyncRequest {
        SyncRequest {
            since,
            filter,
            timeout_ms: self.timeout_ms,
            full_state: self.full_state,
            set_presence: self.set_presence.clone(),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new("@bot:example.org");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
        assert!(!config.full_state);
        assert!(config.set_presence.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = SyncConfig::new("@bot:example.org")
            .with_timeout_ms(5_000)
            .with_presence("offline")
            .with_retry_delay(Duration::from_secs(3));

        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.set_presence.as_deref(), Some("offline"));
        assert_eq!(config.retry_delay_secs, 3);
    }

    #[test]
    fn config_from_toml_string() {
        let config = SyncConfig::from_toml_str(
            r#"
user_id = "@bot:example.org"
timeout_ms = 1000
full_state = true
set_presence = "unavailable"
"#,
        )
        .unwrap();

        assert_eq!(config.user_id, UserId::new("@bot:example.org"));
        assert_eq!(config.timeout_ms, 1000);
        assert!(config.full_state);
        assert_eq!(config.set_presence.as_deref(), Some("unavailable"));
        assert_eq!(config.retry_delay_secs, 10);
    }

    #[test]
    fn missing_user_id_fails() {
        assert!(SyncConfig::from_toml_str("timeout_ms = 1").is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let err = SyncConfig::from_file(Path::new("/nonexistent/roomsync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
        assert!(err.to_string().contains("/nonexistent/roomsync.toml"));
    }

    #[test]
    fn request_carries_config() {
        let config = SyncConfig::new("@bot:example.org")
            .with_timeout_ms(100)
            .with_presence("online");
        let request = config.request(Cursor::new("s1"), Some(FilterId::new("f")));

        assert_eq!(request.since, Cursor::new("s1"));
        assert_eq!(request.filter, Some(FilterId::new("f")));
        assert_eq!(request.timeout_ms, 100);
        assert_eq!(request.set_presence.as_deref(), Some("online"));
    }
}
