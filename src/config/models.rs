//! Configuration data structures for wiredcache.
//!
//! This module defines the schema for the application settings: the local
//! message cache, the remote message API connection and logging.
//!
//! Author: wiredFRONT contributors

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Local message cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Remote message API settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which durable store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit.
    Memory,
    /// One JSON document per key under `storage_path`.
    File,
}

/// What a read should do with a record that has been marked stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleReadPolicy {
    /// Stale records are treated as a cache miss.
    Miss,
    /// Stale records are still returned; only the TTL gates reads.
    Serve,
}

/// Settings for the per-session message cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Age after which a record is expired on read.
    /// Default: `24`
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// Maximum number of messages kept per session.
    /// Default: `1000`
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Chunk size used when merging a write into the existing record.
    /// Default: `50`
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Behaviour of reads that hit a stale record.
    /// Default: `miss`
    #[serde(default = "default_stale_reads")]
    pub stale_reads: StaleReadPolicy,

    /// Durable store backend.
    /// Default: `file`
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Directory of the file backend.
    /// Default: `~/.wiredcache/store`
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
}

/// Settings for the hosted message API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    /// Default: empty (remote disabled)
    #[serde(default)]
    pub base_url: String,

    /// Anonymous or service API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Name of the messages table.
    /// Default: `messages`
    #[serde(default = "default_table")]
    pub table: String,

    /// Request timeout in seconds.
    /// Default: `30`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum attempts for transient failures.
    /// Default: `3`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl RemoteConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            max_messages: default_max_messages(),
            batch_size: default_batch_size(),
            stale_reads: default_stale_reads(),
            backend: default_backend(),
            storage_path: default_storage_path(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            table: default_table(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_ttl_hours() -> i64 {
    24
}

fn default_max_messages() -> usize {
    1000
}

fn default_batch_size() -> usize {
    50
}

fn default_stale_reads() -> StaleReadPolicy {
    StaleReadPolicy::Miss
}

fn default_backend() -> StorageBackend {
    StorageBackend::File
}

fn default_storage_path() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".wiredcache")
        .join("store")
        .to_string_lossy()
        .to_string()
}

fn default_table() -> String {
    "messages".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
