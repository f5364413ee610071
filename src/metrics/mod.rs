// Cache metrics: persisted counters plus a Prometheus mirror
// Author: wiredFRONT contributors

mod models;
mod registry;

pub use models::{ErrorEntry, MetricEvent, MetricsRecord, MAX_ERROR_ENTRIES};
pub use registry::CacheCollectors;

use crate::error::Result;
use crate::storage::{self, DurableStore, Table, METRICS_KEY};
use crate::utils::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Counters for cache hits, misses and syncs, persisted in the
/// [`Table::Metrics`] table so they survive restarts.
pub struct CacheMetrics {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    collectors: Arc<CacheCollectors>,
    /// Serializes read-modify-write of the singleton record
    write_lock: Mutex<()>,
}

impl CacheMetrics {
    pub fn new(
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        collectors: Arc<CacheCollectors>,
    ) -> Self {
        Self {
            store,
            clock,
            collectors,
            write_lock: Mutex::new(()),
        }
    }

    /// Count an event and persist the updated record.
    pub async fn record_metric(&self, event: MetricEvent) -> Result<()> {
        self.collectors.observe(&event);

        let _guard = self.write_lock.lock().await;
        let mut record = self.load().await?;
        record.apply(&event, self.clock.now());
        storage::save(self.store.as_ref(), Table::Metrics, METRICS_KEY, &record).await?;

        debug!("Recorded cache metric: {}", event.label());
        Ok(())
    }

    /// Like [`CacheMetrics::record_metric`], but a failure is only logged.
    /// Instrumentation must never fail the operation being instrumented.
    pub async fn note(&self, event: MetricEvent) {
        let label = event.label();
        if let Err(e) = self.record_metric(event).await {
            warn!("Failed to record cache metric {}: {}", label, e);
        }
    }

    pub async fn get_metrics(&self) -> Result<MetricsRecord> {
        self.load().await
    }

    pub async fn clear_metrics(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(Table::Metrics, METRICS_KEY).await?;
        debug!("Cache metrics cleared");
        Ok(())
    }

    pub fn collectors(&self) -> &CacheCollectors {
        &self.collectors
    }

    async fn load(&self) -> Result<MetricsRecord> {
        Ok(storage::load(self.store.as_ref(), Table::Metrics, METRICS_KEY)
            .await?
            .unwrap_or_default())
    }
}
