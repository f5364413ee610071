//! Versioned key-value object store backing the cache and the metrics.
//!
//! The store exposes two logical tables, [`Table::MessageCache`] (keyed by
//! session id) and [`Table::Metrics`] (a single record under
//! [`METRICS_KEY`]). Values are JSON documents. Every backend is opened with a
//! schema version; opening with a higher version than the one on disk runs an
//! upgrade callback, opening with a lower one fails.
//!
//! Author: wiredFRONT contributors

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Key of the singleton metrics record.
pub const METRICS_KEY: &str = "current";

/// Logical tables of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    MessageCache,
    Metrics,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::MessageCache, Table::Metrics];

    pub fn name(&self) -> &'static str {
        match self {
            Table::MessageCache => "messageCache",
            Table::Metrics => "metrics",
        }
    }
}

/// Handed to the upgrade callback when the schema version increases.
#[derive(Debug)]
pub struct Upgrade {
    /// Version found in the store, `0` for a fresh store.
    pub old_version: u32,
    pub new_version: u32,
    cleared: Vec<Table>,
}

impl Upgrade {
    pub(crate) fn new(old_version: u32, new_version: u32) -> Self {
        Self {
            old_version,
            new_version,
            cleared: Vec::new(),
        }
    }

    /// Drop every entry of `table` once the callback returns.
    pub fn clear_table(&mut self, table: Table) {
        if !self.cleared.contains(&table) {
            self.cleared.push(table);
        }
    }

    pub(crate) fn into_cleared(self) -> Vec<Table> {
        self.cleared
    }
}

/// Asynchronous key-value store with JSON values.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Schema version the store was opened with.
    fn version(&self) -> u32;

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>>;

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()>;

    async fn delete(&self, table: Table, key: &str) -> Result<()>;

    async fn clear(&self, table: Table) -> Result<()>;

    /// All `(key, value)` pairs of a table, ordered by key.
    async fn entries(&self, table: Table) -> Result<Vec<(String, Value)>>;
}

/// Read and deserialize a value.
pub async fn load<T: DeserializeOwned>(
    store: &dyn DurableStore,
    table: Table,
    key: &str,
) -> Result<Option<T>> {
    match store.get(table, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a value.
pub async fn save<T: Serialize>(
    store: &dyn DurableStore,
    table: Table,
    key: &str,
    value: &T,
) -> Result<()> {
    store.put(table, key, serde_json::to_value(value)?).await
}
