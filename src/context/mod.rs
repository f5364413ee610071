//! Application-level wiring of the cache layer.
//!
//! Everything the UI containers need is built once here and handed out by
//! `Arc`: the durable store, the metrics counter and the cache store. There
//! are no module-level instances.
//!
//! Author: wiredFRONT contributors

use crate::cache::{upgrade_schema, CacheConfig, CacheStore, CACHE_VERSION};
use crate::config::{AppConfig, RemoteConfig, StorageBackend};
use crate::error::Result;
use crate::metrics::{CacheCollectors, CacheMetrics};
use crate::remote::{MessageApi, RestMessageApi};
use crate::storage::{DurableStore, FileStore, MemoryStore};
use crate::store::{MessageStore, SessionStore};
use crate::utils::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{error, info};

pub struct CacheContext {
    store: Arc<dyn DurableStore>,
    metrics: Arc<CacheMetrics>,
    cache: Arc<CacheStore>,
}

impl CacheContext {
    /// Open the configured durable store and build the cache on top of it.
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn DurableStore> = match config.cache.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::open(CACHE_VERSION, upgrade_schema)),
            StorageBackend::File => {
                let opened =
                    FileStore::open(&config.cache.storage_path, CACHE_VERSION, upgrade_schema).await;
                match opened {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        error!(
                            "Failed to open cache storage at {}: {}",
                            config.cache.storage_path, e
                        );
                        return Err(e);
                    }
                }
            }
        };

        info!(
            "Cache storage ready ({:?} backend, schema v{})",
            config.cache.backend,
            store.version()
        );
        Self::with_store(CacheConfig::from(&config.cache), store, Arc::new(SystemClock))
    }

    /// Build the layer over an already opened store.
    pub fn with_store(
        cache_config: CacheConfig,
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let collectors = Arc::new(CacheCollectors::new()?);
        let metrics = Arc::new(CacheMetrics::new(store.clone(), clock.clone(), collectors));
        let cache = Arc::new(CacheStore::new(cache_config, store.clone(), metrics.clone(), clock));
        Ok(Self {
            store,
            metrics,
            cache,
        })
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Message and session containers over `api`.
    pub fn stores(&self, api: Arc<dyn MessageApi>) -> (Arc<MessageStore>, SessionStore) {
        let messages = Arc::new(MessageStore::new(self.cache.clone(), api));
        let sessions = SessionStore::new(messages.clone());
        (messages, sessions)
    }

    /// REST client for the configured hosted backend.
    pub fn remote_api(config: &RemoteConfig) -> Result<Arc<dyn MessageApi>> {
        Ok(Arc::new(RestMessageApi::new(config)?))
    }
}
