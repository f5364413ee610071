//! Persisted cache metrics record.

// Author: wiredFRONT contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recent errors kept in [`MetricsRecord::errors`].
pub const MAX_ERROR_ENTRIES: usize = 50;

/// Something worth counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Hit,
    Miss,
    SyncAttempt,
    SyncSuccess,
    Error(String),
}

impl MetricEvent {
    pub fn label(&self) -> &'static str {
        match self {
            MetricEvent::Hit => "hit",
            MetricEvent::Miss => "miss",
            MetricEvent::SyncAttempt => "sync_attempt",
            MetricEvent::SyncSuccess => "sync_success",
            MetricEvent::Error(_) => "error",
        }
    }
}

/// A recorded error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

/// Singleton counters stored under the `"current"` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub sync_attempts: u64,
    pub sync_successes: u64,
    /// Newest first, at most [`MAX_ERROR_ENTRIES`].
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl MetricsRecord {
    /// Fold an event into the record.
    pub fn apply(&mut self, event: &MetricEvent, at: DateTime<Utc>) {
        match event {
            MetricEvent::Hit => self.cache_hits += 1,
            MetricEvent::Miss => self.cache_misses += 1,
            MetricEvent::SyncAttempt => self.sync_attempts += 1,
            MetricEvent::SyncSuccess => self.sync_successes += 1,
            MetricEvent::Error(message) => {
                self.errors.insert(
                    0,
                    ErrorEntry {
                        timestamp: at,
                        error: message.clone(),
                    },
                );
                self.errors.truncate(MAX_ERROR_ENTRIES);
            }
        }
        self.last_updated = Some(at);
    }

    /// Share of reads served from the cache, `None` before the first read.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            None
        } else {
            Some(self.cache_hits as f64 / total as f64)
        }
    }

    /// Sync attempts that have not (yet) been matched by a success.
    pub fn failed_syncs(&self) -> u64 {
        self.sync_attempts.saturating_sub(self.sync_successes)
    }
}
