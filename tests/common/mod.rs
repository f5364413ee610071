// Shared fixtures for integration tests
// Author: wiredFRONT contributors

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wiredcache::cache::CacheConfig;
use wiredcache::context::CacheContext;
use wiredcache::error::{CacheError, Result};
use wiredcache::models::{Message, MessageStatus, Role};
use wiredcache::storage::{DurableStore, MemoryStore, Table};
use wiredcache::utils::ManualClock;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn message(session_id: &str, id: &str, minute: i64) -> Message {
    Message {
        id: id.to_string(),
        session_id: session_id.to_string(),
        content: format!("content of {}", id),
        role: if minute % 2 == 0 { Role::User } else { Role::Assistant },
        created_at: epoch() + Duration::minutes(minute),
        updated_at: None,
        status: MessageStatus::Sent,
        metadata: Default::default(),
    }
}

pub fn messages(session_id: &str, prefix: &str, count: usize) -> Vec<Message> {
    (0..count)
        .map(|i| message(session_id, &format!("{}{}", prefix, i), i as i64))
        .collect()
}

pub fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

/// Memory store whose `messageCache` table can be made to fail. The
/// metrics table keeps working so failures can be observed in the counters.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    fn check(&self, table: Table, flag: &AtomicBool) -> Result<()> {
        if table == Table::MessageCache && flag.load(Ordering::SeqCst) {
            return Err(CacheError::Storage("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    fn version(&self) -> u32 {
        self.inner.version()
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>> {
        self.check(table, &self.fail_reads)?;
        self.inner.get(table, key).await
    }

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()> {
        self.check(table, &self.fail_writes)?;
        self.inner.put(table, key, value).await
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        self.check(table, &self.fail_writes)?;
        self.inner.delete(table, key).await
    }

    async fn clear(&self, table: Table) -> Result<()> {
        self.check(table, &self.fail_writes)?;
        self.inner.clear(table).await
    }

    async fn entries(&self, table: Table) -> Result<Vec<(String, Value)>> {
        self.check(table, &self.fail_reads)?;
        self.inner.entries(table).await
    }
}

/// Memory store whose `messageCache` reads can be slowed down, to widen the
/// window between a read and the write that follows it.
#[derive(Default)]
pub struct SlowStore {
    inner: MemoryStore,
    pub slow_reads: AtomicBool,
}

#[async_trait]
impl DurableStore for SlowStore {
    fn version(&self) -> u32 {
        self.inner.version()
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>> {
        if table == Table::MessageCache && self.slow_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        self.inner.get(table, key).await
    }

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()> {
        self.inner.put(table, key, value).await
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        self.inner.delete(table, key).await
    }

    async fn clear(&self, table: Table) -> Result<()> {
        self.inner.clear(table).await
    }

    async fn entries(&self, table: Table) -> Result<Vec<(String, Value)>> {
        self.inner.entries(table).await
    }
}

pub struct Harness {
    pub ctx: CacheContext,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(config: CacheConfig, store: Arc<dyn DurableStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(epoch()));
    let ctx = CacheContext::with_store(config, store, clock.clone()).unwrap();
    Harness { ctx, clock }
}

pub fn harness() -> Harness {
    harness_with(CacheConfig::default(), Arc::new(MemoryStore::default()))
}
