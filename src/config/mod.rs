//! Configuration module for the audit vault.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a vault instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Where ciphertext, key material and the catalog live.
    pub storage: StorageConfig,
    /// Background reconciliation loop.
    pub reconciliation: ReconcileConfig,
    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

impl VaultConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| VaultError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.reconciliation.validate()?;
        Ok(())
    }

    /// Configuration rooted at a single base directory, with key material
    /// and ciphertext in sibling directories.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            storage: StorageConfig {
                blob_dir: base.join("blobs"),
                key_dir: base.join("keys"),
                catalog_path: base.join("catalog.sqlite3"),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        let mut config = Self::rooted_at("/tmp/auditvault");
        config.reconciliation.interval = Duration::from_secs(60);
        config.observability.log_level = "debug".to_string();
        config
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for encrypted archive payloads.
    pub blob_dir: PathBuf,
    /// Directory for wrapped archive keys, the master key and the integrity
    /// secret. Must not overlap `blob_dir`.
    pub key_dir: PathBuf,
    /// SQLite catalog file.
    pub catalog_path: PathBuf,
    /// gzip level applied before encryption (0-9).
    pub compression_level: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: PathBuf::from("/var/lib/auditvault/blobs"),
            key_dir: PathBuf::from("/var/lib/auditvault/keys"),
            catalog_path: PathBuf::from("/var/lib/auditvault/catalog.sqlite3"),
            compression_level: 6,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.key_dir == self.blob_dir || self.key_dir.starts_with(&self.blob_dir) {
            return Err(VaultError::InvalidConfig {
                field: "storage.key_dir".to_string(),
                reason: "key material must not be stored inside the blob directory".to_string(),
            });
        }

        if self.blob_dir.starts_with(&self.key_dir) {
            return Err(VaultError::InvalidConfig {
                field: "storage.blob_dir".to_string(),
                reason: "blob directory must not be nested inside the key directory".to_string(),
            });
        }

        if self.compression_level > 9 {
            return Err(VaultError::InvalidConfig {
                field: "storage.compression_level".to_string(),
                reason: "compression level must be between 0 and 9".to_string(),
            });
        }

        Ok(())
    }
}

/// Reconciliation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Whether `run` starts the background loop.
    pub enabled: bool,
    /// Time between ticks.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Active archives re-verified per tick.
    pub sample_size: usize,
    /// Extra attempts for a step that failed with a transient error.
    pub max_retries: u32,
    /// Pause between retry attempts.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// Bound on waiting for an in-flight tick during shutdown.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Operational log entries older than this are pruned.
    pub oplog_retention_days: u32,
    /// Horizon for the "expiring soon" section of the status report.
    pub expiring_window_days: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3600), // hourly
            sample_size: 5,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(30),
            oplog_retention_days: 365,
            expiring_window_days: 30,
        }
    }
}

impl ReconcileConfig {
    fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(VaultError::InvalidConfig {
                field: "reconciliation.interval".to_string(),
                reason: "interval must be non-zero".to_string(),
            });
        }

        if self.oplog_retention_days == 0 {
            return Err(VaultError::InvalidConfig {
                field: "reconciliation.oplog_retention_days".to_string(),
                reason: "operational log retention must be at least one day".to_string(),
            });
        }

        if self.expiring_window_days == 0 {
            return Err(VaultError::InvalidConfig {
                field: "reconciliation.expiring_window_days".to_string(),
                reason: "expiring window must be at least one day".to_string(),
            });
        }

        Ok(())
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            m.trim()
                .parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else if let Some(h) = s.strip_suffix('h') {
            h.trim()
                .parse::<u64>()
                .map(|v| Duration::from_secs(v * 3600))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
