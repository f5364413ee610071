// Prometheus registry and collectors for the cache layer
// Author: wiredFRONT contributors

use super::models::MetricEvent;
use crate::error::{CacheError, Result};
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Prometheus mirror of the persisted counters.
pub struct CacheCollectors {
    registry: Registry,

    /// Cache operations by kind
    operations: IntCounterVec,

    /// Errors recorded through the metrics service
    errors: IntCounter,

    /// Session records currently cached
    records: IntGauge,
}

impl CacheCollectors {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("wiredcache".to_string()), None)
            .map_err(prom_err)?;

        let operations = register_int_counter_vec_with_registry!(
            Opts::new("cache_operations_total", "Total cache operations"),
            &["operation"], // hit, miss, sync_attempt, sync_success
            registry
        )
        .map_err(prom_err)?;

        let errors = register_int_counter_with_registry!(
            Opts::new("cache_errors_total", "Total cache errors recorded"),
            registry
        )
        .map_err(prom_err)?;

        let records = register_int_gauge_with_registry!(
            Opts::new("cache_records_current", "Current number of cached session records"),
            registry
        )
        .map_err(prom_err)?;

        Ok(Self {
            registry,
            operations,
            errors,
            records,
        })
    }

    pub fn observe(&self, event: &MetricEvent) {
        match event {
            MetricEvent::Error(_) => self.errors.inc(),
            other => self.operations.with_label_values(&[other.label()]).inc(),
        }
    }

    pub fn set_records(&self, count: usize) {
        self.records.set(count as i64);
    }

    pub fn operation_count(&self, event: &MetricEvent) -> u64 {
        match event {
            MetricEvent::Error(_) => self.errors.get(),
            other => self.operations.with_label_values(&[other.label()]).get(),
        }
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(prom_err)?;
        String::from_utf8(buffer).map_err(|e| CacheError::Internal(e.to_string()))
    }
}

fn prom_err(e: prometheus::Error) -> CacheError {
    CacheError::Internal(format!("prometheus: {}", e))
}
