//! Store configuration.
//!
//! Loaded from a TOML file with `[kdf]`, `[database]` and `[sync]` sections.
//! Every field has a default, so an empty file (or no file) is valid.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crypto::Argon2Params;

/// Root configuration for a login store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Key derivation settings, used when a store is created.
    #[serde(default)]
    pub kdf: KdfConfig,
    /// SQLite settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Sync pass settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Argon2id settings for new stores.
///
/// Existing stores always reopen with the parameters recorded at creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KdfConfig {
    /// Memory cost in MiB (default: scaled to device RAM).
    pub memory_mib: Option<u32>,
    /// Iteration count (default: scaled to device RAM).
    pub iterations: Option<u32>,
    /// Lane count (default: scaled to device RAM).
    pub parallelism: Option<u32>,
}

impl KdfConfig {
    /// Resolve to concrete parameters, filling gaps from the device profile.
    pub fn params(&self) -> Argon2Params {
        let base = match (self.memory_mib, self.iterations, self.parallelism) {
            (Some(m), Some(i), Some(p)) => return Argon2Params::new(m, i, p),
            _ => Argon2Params::default(),
        };
        Argon2Params::new(
            self.memory_mib.unwrap_or(base.memory_mib()),
            self.iterations.unwrap_or(base.iterations()),
            self.parallelism.unwrap_or(base.parallelism()),
        )
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Busy timeout in milliseconds (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Busy timeout as a duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Sync pass settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Records requested per fetch (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum records per upload batch (default: 100).
    #[serde(default = "default_upload_batch")]
    pub upload_batch: usize,
}

// Default value functions
fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_page_size() -> u32 {
    100
}

fn default_upload_batch() -> usize {
    100
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            upload_batch: default_upload_batch(),
        }
    }
}

impl StoreConfig {
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

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Use fixed Argon2 parameters instead of the device profile.
    pub fn with_kdf(mut self, params: Argon2Params) -> Self {
        self.kdf = KdfConfig {
            memory_mib: Some(params.memory_mib()),
            iterations: Some(params.iterations()),
            parallelism: Some(params.parallelism()),
        };
        self
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
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.upload_batch, 100);
        assert!(config.kdf.memory_mib.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [kdf]
            memory_mib = 8
            iterations = 2
            parallelism = 1

            [database]
            max_connections = 2
            busy_timeout_ms = 250

            [sync]
            page_size = 10
            upload_batch = 5
        "#;

        let config: StoreConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kdf.params(), Argon2Params::new(8, 2, 1));
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.sync.page_size, 10);
        assert_eq!(config.sync.upload_batch, 5);
    }

    #[test]
    fn partial_kdf_fills_from_device_profile() {
        let config: StoreConfig = toml::from_str("[kdf]\niterations = 7\n").unwrap();
        let params = config.kdf.params();
        assert_eq!(params.iterations(), 7);
        assert!(params.memory_mib() >= 12);
    }

    #[test]
    fn with_kdf_pins_parameters() {
        let config = StoreConfig::default().with_kdf(Argon2Params::new(1, 1, 1));
        assert_eq!(config.kdf.params(), Argon2Params::new(1, 1, 1));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = StoreConfig::from_file(Path::new("/nonexistent/loginstore.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[database\nmax_connections = ").unwrap();
        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
