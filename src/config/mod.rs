// Configuration module
// Author: wiredFRONT contributors

mod models;

pub use models::*;

use crate::error::{CacheError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Same as [`AppConfig::load`] with an explicit config file path.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(path).required(false))
            // WIREDCACHE_CACHE__TTL_HOURS=12
            .add_source(
                Environment::with_prefix("WIREDCACHE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| CacheError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_hours <= 0 {
            return Err(CacheError::Config("cache.ttl_hours must be positive".into()));
        }
        if self.cache.max_messages == 0 {
            return Err(CacheError::Config("cache.max_messages must be positive".into()));
        }
        if self.cache.batch_size == 0 {
            return Err(CacheError::Config("cache.batch_size must be positive".into()));
        }
        Ok(())
    }

    pub fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wiredcache")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
