// Message cache module
// Author: wiredFRONT contributors

pub mod manager;
pub mod models;

pub use manager::{merge_batches, optimize_messages, upgrade_schema, CacheStore};
pub use models::{
    CacheConfig, CacheStatus, CacheWrite, CachedSessionRecord, RecordMetadata, CACHE_VERSION,
};
