// Per-session message cache
// Author: wiredFRONT contributors

use crate::cache::models::{
    CacheConfig, CacheStatus, CacheWrite, CachedSessionRecord, CACHE_VERSION,
};
use crate::config::StaleReadPolicy;
use crate::error::{CacheError, Result};
use crate::metrics::{CacheMetrics, MetricEvent};
use crate::models::Message;
use crate::storage::{self, DurableStore, Table, Upgrade};
use crate::utils::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Schema upgrade for the cache tables. Records from an older layout are
/// dropped; the remote store can always repopulate them.
pub fn upgrade_schema(upgrade: &mut Upgrade) {
    if upgrade.old_version > 0 && upgrade.old_version < CACHE_VERSION {
        info!(
            "Dropping message cache written by layout {}",
            upgrade.old_version
        );
        upgrade.clear_table(Table::MessageCache);
    }
}

/// Merge `incoming` into `existing` one chunk at a time: each chunk is put in
/// front of what has been merged so far and the result is capped at `max`.
pub fn merge_batches(
    existing: Vec<Message>,
    incoming: &[Message],
    batch_size: usize,
    max: usize,
) -> Vec<Message> {
    let mut merged = existing;
    for chunk in incoming.chunks(batch_size.max(1)) {
        let mut next = Vec::with_capacity((chunk.len() + merged.len()).min(max));
        next.extend_from_slice(chunk);
        next.extend(merged);
        next.truncate(max);
        merged = next;
    }
    merged
}

/// Deduplicate by id (the last occurrence wins), order newest first and cap.
pub fn optimize_messages(messages: Vec<Message>, max: usize) -> Vec<Message> {
    let mut by_id: HashMap<String, Message> = HashMap::with_capacity(messages.len());
    for message in messages {
        by_id.insert(message.id.clone(), message);
    }
    let mut optimized: Vec<Message> = by_id.into_values().collect();
    optimized.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    optimized.truncate(max);
    optimized
}

/// Batched per-session message cache on top of a [`DurableStore`].
pub struct CacheStore {
    config: CacheConfig,
    store: Arc<dyn DurableStore>,
    metrics: Arc<CacheMetrics>,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles on records
    write_lock: Mutex<()>,
}

impl CacheStore {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn DurableStore>,
        metrics: Arc<CacheMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            metrics,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Merge `messages` into the session's cached record.
    pub async fn cache_messages(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        self.write(session_id, messages, CacheWrite::Merge).await
    }

    /// Write messages for a session, recording sync metrics around the write.
    pub async fn write(&self, session_id: &str, messages: &[Message], mode: CacheWrite) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_locked(session_id, messages, mode).await
    }

    /// Merge `messages` into the session's record only when a read would
    /// serve that record. Returns whether anything was written.
    ///
    /// A session without a usable record is left alone so the next load goes
    /// to the remote store for the full history.
    pub async fn append_to_cached(&self, session_id: &str, messages: &[Message]) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let record = match self.read_record(session_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!("Unreadable cache record for session {}: {}", session_id, e);
                return Ok(false);
            }
        };
        if record.is_expired(self.clock.now(), self.config.ttl) || !self.is_servable(&record) {
            debug!("Not appending to unservable session {}", session_id);
            return Ok(false);
        }

        self.write_locked(session_id, messages, CacheWrite::Merge).await?;
        Ok(true)
    }

    // caller holds `write_lock`
    async fn write_locked(&self, session_id: &str, messages: &[Message], mode: CacheWrite) -> Result<()> {
        self.metrics.note(MetricEvent::SyncAttempt).await;

        match self.write_record(session_id, messages, mode).await {
            Ok(()) => {
                self.metrics.note(MetricEvent::SyncSuccess).await;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to cache messages for session {}: {}", session_id, e);
                self.metrics
                    .note(MetricEvent::Error(format!(
                        "cache_messages({}): {}",
                        session_id, e
                    )))
                    .await;
                Err(e)
            }
        }
    }

    async fn write_record(&self, session_id: &str, messages: &[Message], mode: CacheWrite) -> Result<()> {
        let merged = match mode {
            CacheWrite::Merge => {
                if messages.is_empty() {
                    debug!("Nothing to cache for session {}", session_id);
                    return Ok(());
                }
                let existing = self
                    .existing_for_merge(session_id)
                    .await?
                    .filter(|r| r.status() != CacheStatus::Invalid)
                    .map(|r| r.messages)
                    .unwrap_or_default();
                merge_batches(
                    existing,
                    messages,
                    self.config.batch_size,
                    self.config.max_messages,
                )
            }
            CacheWrite::Replace => {
                let mut replaced = messages.to_vec();
                replaced.truncate(self.config.max_messages);
                replaced
            }
        };

        let record = CachedSessionRecord::new(session_id, merged, self.clock.now());
        debug!(
            "Caching {} messages for session {} ({} in record)",
            messages.len(),
            session_id,
            record.metadata.size
        );
        storage::save(self.store.as_ref(), Table::MessageCache, session_id, &record).await
    }

    /// The record a merge starts from. A record that no longer parses is
    /// reported and overwritten instead of blocking every later write.
    async fn existing_for_merge(&self, session_id: &str) -> Result<Option<CachedSessionRecord>> {
        match self.read_record(session_id).await {
            Err(CacheError::Json(e)) => {
                warn!(
                    "Discarding unreadable cache record for session {}: {}",
                    session_id, e
                );
                self.metrics
                    .note(MetricEvent::Error(format!(
                        "cache_messages({}): unreadable record: {}",
                        session_id, e
                    )))
                    .await;
                Ok(None)
            }
            other => other,
        }
    }

    /// Cached messages for a session, newest first, or `None` on a miss.
    ///
    /// A record older than the TTL is marked stale and reported as a miss.
    /// Read failures are recorded and reported as a miss.
    pub async fn get_cached_messages(&self, session_id: &str) -> Option<Vec<Message>> {
        let record = match self.read_record(session_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Cache miss for session {}", session_id);
                self.metrics.note(MetricEvent::Miss).await;
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for session {}: {}", session_id, e);
                self.metrics
                    .note(MetricEvent::Error(format!(
                        "get_cached_messages({}): {}",
                        session_id, e
                    )))
                    .await;
                self.metrics.note(MetricEvent::Miss).await;
                return None;
            }
        };

        let now = self.clock.now();
        if record.is_expired(now, self.config.ttl) {
            debug!("Cache expired for session {}", session_id);
            if record.metadata.status != CacheStatus::Stale {
                if let Err(e) = self.set_status(session_id, CacheStatus::Stale).await {
                    warn!("Failed to mark session {} stale: {}", session_id, e);
                }
            }
            self.metrics.note(MetricEvent::Miss).await;
            return None;
        }

        if !self.is_servable(&record) {
            debug!(
                "Cache record for session {} is {:?}, treating as miss",
                session_id,
                record.status()
            );
            self.metrics.note(MetricEvent::Miss).await;
            return None;
        }

        debug!("Cache hit for session {}", session_id);
        self.metrics.note(MetricEvent::Hit).await;
        Some(record.messages)
    }

    /// The raw record, regardless of age or status. Does not touch metrics.
    pub async fn get_cached_record(&self, session_id: &str) -> Result<Option<CachedSessionRecord>> {
        self.read_record(session_id).await
    }

    /// Mark a record stale without deleting its data.
    /// Returns `false` when there was nothing cached.
    pub async fn invalidate_cache(&self, session_id: &str) -> Result<bool> {
        let invalidated = self.set_status(session_id, CacheStatus::Stale).await?;
        if invalidated {
            debug!("Invalidated cache for session {}", session_id);
        }
        Ok(invalidated)
    }

    pub async fn clear_cache(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(Table::MessageCache, session_id).await?;
        debug!("Cleared cache for session {}", session_id);
        Ok(())
    }

    pub async fn clear_all_cache(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.clear(Table::MessageCache).await?;
        self.metrics.collectors().set_records(0);
        info!("Cleared all cached sessions");
        Ok(())
    }

    /// Deduplicate, reorder and trim a session's record, then rewrite it.
    ///
    /// Records that a read would not serve (expired, or stale under the
    /// `Miss` policy) are left alone. Returns the optimized message count.
    pub async fn optimize_cache(&self, session_id: &str) -> Result<Option<usize>> {
        let _guard = self.write_lock.lock().await;
        let record = match self.read_record(session_id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let now = self.clock.now();
        if record.is_expired(now, self.config.ttl) || !self.is_servable(&record) {
            debug!("Skipping optimize for unservable session {}", session_id);
            return Ok(None);
        }

        let before = record.messages.len();
        let optimized = optimize_messages(record.messages, self.config.max_messages);
        let after = optimized.len();
        self.write_locked(session_id, &optimized, CacheWrite::Replace).await?;

        if before != after {
            info!(
                "Optimized session {}: {} -> {} messages",
                session_id, before, after
            );
        }
        Ok(Some(after))
    }

    /// Session ids whose stored status is `status`.
    pub async fn sessions_with_status(&self, status: CacheStatus) -> Result<Vec<String>> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.status() == status)
            .map(|r| r.session_id)
            .collect())
    }

    /// Session ids whose last write is older than the TTL, oldest first.
    pub async fn expired_sessions(&self) -> Result<Vec<String>> {
        let now = self.clock.now();
        let mut expired: Vec<CachedSessionRecord> = self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.is_expired(now, self.config.ttl))
            .collect();
        expired.sort_by_key(|r| r.timestamp);
        Ok(expired.into_iter().map(|r| r.session_id).collect())
    }

    /// Delete every expired record. Returns how many were removed.
    pub async fn prune_expired(&self) -> Result<usize> {
        let expired = self.expired_sessions().await?;
        let _guard = self.write_lock.lock().await;
        for session_id in &expired {
            self.store.delete(Table::MessageCache, session_id).await?;
        }
        if !expired.is_empty() {
            info!("Pruned {} expired session records", expired.len());
        }
        Ok(expired.len())
    }

    /// Number of cached session records. Also refreshes the records gauge.
    pub async fn record_count(&self) -> Result<usize> {
        let count = self.store.entries(Table::MessageCache).await?.len();
        self.metrics.collectors().set_records(count);
        Ok(count)
    }

    async fn records(&self) -> Result<Vec<CachedSessionRecord>> {
        let entries = self.store.entries(Table::MessageCache).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value::<CachedSessionRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable cache record {}: {}", key, e),
            }
        }
        Ok(records)
    }

    fn is_servable(&self, record: &CachedSessionRecord) -> bool {
        match record.status() {
            CacheStatus::Valid => true,
            CacheStatus::Stale => self.config.stale_reads == StaleReadPolicy::Serve,
            CacheStatus::Invalid => false,
        }
    }

    async fn read_record(&self, session_id: &str) -> Result<Option<CachedSessionRecord>> {
        storage::load(self.store.as_ref(), Table::MessageCache, session_id).await
    }

    async fn set_status(&self, session_id: &str, status: CacheStatus) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut record = match self.read_record(session_id).await? {
            Some(record) => record,
            None => return Ok(false),
        };
        record.metadata.status = status;
        storage::save(self.store.as_ref(), Table::MessageCache, session_id, &record).await?;
        Ok(true)
    }
}
