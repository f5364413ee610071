//! Cache configuration and per-session record models.

// Author: wiredFRONT contributors

use crate::config::{CacheSettings, StaleReadPolicy};
use crate::models::Message;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Layout version of [`CachedSessionRecord`]. Also the schema version the
/// durable store is opened with.
pub const CACHE_VERSION: u32 = 1;

/// Configuration for the message cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Records older than this are expired on read.
    pub ttl: Duration,
    /// Maximum messages kept per session.
    pub max_messages: usize,
    /// Chunk size used when merging a write into an existing record.
    pub batch_size: usize,
    /// Whether a record marked stale is still served.
    pub stale_reads: StaleReadPolicy,
}

impl Default for CacheConfig {
    /// - `ttl`: 24 hours
    /// - `max_messages`: 1000
    /// - `batch_size`: 50
    /// - `stale_reads`: `Miss`
    fn default() -> Self {
        Self {
            ttl: Duration::hours(24),
            max_messages: 1000,
            batch_size: 50,
            stale_reads: StaleReadPolicy::Miss,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: Duration::hours(settings.ttl_hours),
            max_messages: settings.max_messages,
            batch_size: settings.batch_size,
            stale_reads: settings.stale_reads,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Valid,
    /// Invalidated or expired; data kept until the next write.
    Stale,
    /// Written by an incompatible layout version.
    Invalid,
}

/// How a write combines with what is already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// Prepend the new messages to the existing record.
    Merge,
    /// Discard the existing record.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    pub last_sync: DateTime<Utc>,
    pub version: u32,
    pub size: usize,
    pub status: CacheStatus,
}

/// Messages cached for one session, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSessionRecord {
    pub session_id: String,
    pub messages: Vec<Message>,
    /// Last write time.
    pub timestamp: DateTime<Utc>,
    pub metadata: RecordMetadata,
}

impl CachedSessionRecord {
    /// Fresh, valid record written at `now`.
    pub fn new(session_id: impl Into<String>, messages: Vec<Message>, now: DateTime<Utc>) -> Self {
        let size = messages.len();
        Self {
            session_id: session_id.into(),
            messages,
            timestamp: now,
            metadata: RecordMetadata {
                last_sync: now,
                version: CACHE_VERSION,
                size,
                status: CacheStatus::Valid,
            },
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    pub fn status(&self) -> CacheStatus {
        if self.metadata.version != CACHE_VERSION {
            CacheStatus::Invalid
        } else {
            self.metadata.status
        }
    }
}
