use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// Defaults
// =============================================================================

/// A resolution lock older than this is considered abandoned (30 seconds)
pub const DEFAULT_LOCK_TIMEOUT_MS: i64 = 30_000;

/// Attempts per entity in a fan-out before it is reported as failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay between fan-out attempts for one entity (200ms)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Entities resolved concurrently in a fan-out
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Attempts to take a per-entity lock before giving up as busy
pub const DEFAULT_LOCK_ATTEMPTS: u32 = 5;

/// Delay between lock attempts (50ms)
pub const DEFAULT_LOCK_RETRY_DELAY_MS: u64 = 50;

const APP_NAME: &str = "forge-resolver";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub compatibility: CompatibilityConfig,
    pub logging: LoggingConfig,
}

impl ResolverConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configured database path, or the default one under the data directory
    pub fn db_path(&self) -> PathBuf {
        self.cache.path.clone().unwrap_or_else(db_path)
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub path: Option<PathBuf>,
    /// Stale resolution lock takeover threshold in milliseconds
    pub lock_timeout_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

/// Fan-out and locking behaviour
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub concurrency: usize,
    pub lock_attempts: u32,
    pub lock_retry_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            concurrency: DEFAULT_CONCURRENCY,
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
            lock_retry_delay_ms: DEFAULT_LOCK_RETRY_DELAY_MS,
        }
    }
}

/// Compatibility pin policy
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompatibilityConfig {
    /// Pin rows whose constraint cannot admit a newer release
    pub pin_bounded_constraints: bool,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            pin_bounded_constraints: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
    /// Log to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Returns the path to the data directory for forge-resolver.
/// Uses $XDG_DATA_HOME/forge-resolver if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/forge-resolver,
/// or ./forge-resolver if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("resolution.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("forge-resolver.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_NAME)
}
