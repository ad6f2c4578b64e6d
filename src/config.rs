//! Label cache configuration.
//!
//! Loaded from a TOML file with [`Config::load`]:
//!
//! ```toml
//! [storage]
//! directory = "/var/lib/labelcache"
//! sync_mode = "none"
//!
//! [front_cache]
//! initial_capacity = "4K"
//! headroom = 3
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Subdirectory of [`StorageConfig::directory`] that holds the store.
pub const STORE_SUBDIR: &str = "labels";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Persisted store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Front cache sizing.
    #[serde(default)]
    pub front_cache: FrontCacheConfig,

    /// Logging settings used by [`crate::logging::init`].
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.sync_mode.is_async() && self.storage.fsync_ms == 0 {
            return Err(ConfigError::Invalid(
                "fsync_ms must be > 0 when sync_mode is \"async\"".to_string(),
            ));
        }

        let front = &self.front_cache;
        if front.initial_capacity == 0 {
            return Err(ConfigError::Invalid(
                "front_cache.initial_capacity must be > 0".to_string(),
            ));
        }
        if front.headroom == 0 {
            return Err(ConfigError::Invalid(
                "front_cache.headroom must be > 0".to_string(),
            ));
        }
        if front.initial_capacity > front.max_capacity {
            return Err(ConfigError::Invalid(format!(
                "front_cache.initial_capacity ({}) must not exceed max_capacity ({})",
                front.initial_capacity, front.max_capacity
            )));
        }

        Ok(())
    }
}

/// Persisted store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory owning the store. The store itself lives in
    /// `<directory>/labels`.
    #[serde(default = "StorageConfig::default_directory")]
    pub directory: PathBuf,

    /// Durability level of committed batches.
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Background fsync period in milliseconds for [`SyncMode::Async`].
    #[serde(default = "StorageConfig::default_fsync_ms")]
    pub fsync_ms: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            sync_mode: SyncMode::default(),
            fsync_ms: Self::default_fsync_ms(),
        }
    }
}

impl StorageConfig {
    /// Create a storage config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning directory.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the synchronization mode.
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Set the background fsync period for async mode.
    pub fn fsync_ms(mut self, ms: u16) -> Self {
        self.fsync_ms = ms;
        self
    }

    /// Path of the store inside the owning directory.
    pub fn path(&self) -> PathBuf {
        self.directory.join(STORE_SUBDIR)
    }

    fn default_directory() -> PathBuf {
        PathBuf::from("/var/lib/labelcache")
    }

    fn default_fsync_ms() -> u16 {
        1000
    }
}

/// Synchronization mode for store writes.
///
/// Controls how aggressively committed batches are flushed to disk, trading
/// off durability against write throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// fsync on every batch commit.
    ///
    /// Nothing acknowledged is lost on crash; every intern pays for a sync.
    Sync,

    /// Background fsync every `fsync_ms`.
    ///
    /// Batches written since the last sync may be lost on crash.
    Async,

    /// No explicit sync; the engine and OS decide when to flush.
    ///
    /// Highest throughput. A crash can lose recent IDs, which are then
    /// minted again for whatever label sets arrive next.
    #[default]
    None,
}

impl SyncMode {
    /// Check if this mode requires an fsync per batch.
    pub fn is_sync(&self) -> bool {
        matches!(self, SyncMode::Sync)
    }

    /// Check if this mode uses background sync.
    pub fn is_async(&self) -> bool {
        matches!(self, SyncMode::Async)
    }
}

/// Front cache sizing.
///
/// Both front caches start at `initial_capacity` entries. Before each write
/// batch they grow to `headroom * batch_len` if that is larger, capped at
/// `max_capacity`. They never shrink.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontCacheConfig {
    /// Starting capacity of each front cache, in entries.
    #[serde(
        default = "FrontCacheConfig::default_initial_capacity",
        deserialize_with = "deserialize_count"
    )]
    pub initial_capacity: usize,

    /// Multiplier applied to the batch length when growing.
    #[serde(default = "FrontCacheConfig::default_headroom")]
    pub headroom: usize,

    /// Upper bound on growth, in entries.
    #[serde(
        default = "FrontCacheConfig::default_max_capacity",
        deserialize_with = "deserialize_count"
    )]
    pub max_capacity: usize,
}

impl Default for FrontCacheConfig {
    fn default() -> Self {
        Self {
            initial_capacity: Self::default_initial_capacity(),
            headroom: Self::default_headroom(),
            max_capacity: Self::default_max_capacity(),
        }
    }
}

impl FrontCacheConfig {
    /// Create a front cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting capacity.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the growth multiplier.
    pub fn headroom(mut self, headroom: usize) -> Self {
        self.headroom = headroom;
        self
    }

    /// Set the growth ceiling.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    fn default_initial_capacity() -> usize {
        1024
    }

    fn default_headroom() -> usize {
        3
    }

    fn default_max_capacity() -> usize {
        4 * 1024 * 1024
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter, e.g. `info` or `labelcache=debug`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// Single-line abbreviated output.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(std::io::Error),
    /// The file is not valid TOML for [`Config`].
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    /// The values are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Deserialize an entry count: a plain integer, or a string with an
/// optional `K` or `M` suffix such as `"64K"`.
fn deserialize_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct CountVisitor;

    impl serde::de::Visitor<'_> for CountVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an entry count such as 4096 or \"4K\"")
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<usize, E> {
            usize::try_from(v).map_err(|_| E::custom(format!("negative count: {v}")))
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<usize, E> {
            usize::try_from(v).map_err(|_| E::custom(format!("count too large: {v}")))
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<usize, E> {
            parse_count(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

/// Parse a count string like "512", "64K" or "4M" (binary multiples).
pub fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, multiplier) = if let Some(n) = s.strip_suffix(['K', 'k']) {
        (n, 1 << 10)
    } else if let Some(n) = s.strip_suffix(['M', 'm']) {
        (n, 1 << 20)
    } else {
        (s, 1)
    };

    let n: usize = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid count: {s:?}"))?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("count overflow: {s:?}"))
}
