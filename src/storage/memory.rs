// In-memory durable store backend
// Author: wiredFRONT contributors

use super::{DurableStore, Table, Upgrade};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Process-local store. Contents are lost when dropped.
pub struct MemoryStore {
    version: u32,
    tables: RwLock<HashMap<Table, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Empty store at `version` without an upgrade step.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Open a fresh store. A memory store always starts at version 0, so the
    /// upgrade callback runs once with `old_version == 0`.
    pub fn open<F>(version: u32, upgrade: F) -> Self
    where
        F: FnOnce(&mut Upgrade),
    {
        let mut step = Upgrade::new(0, version);
        upgrade(&mut step);
        debug!("Opened memory store at version {}", version);
        Self::new(version)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    fn version(&self) -> u32 {
        self.version
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>> {
        Ok(self.tables.read().get(&table).and_then(|t| t.get(key).cloned()))
    }

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()> {
        self.tables
            .write()
            .entry(table)
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        if let Some(t) = self.tables.write().get_mut(&table) {
            t.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, table: Table) -> Result<()> {
        self.tables.write().remove(&table);
        Ok(())
    }

    async fn entries(&self, table: Table) -> Result<Vec<(String, Value)>> {
        Ok(self
            .tables
            .read()
            .get(&table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
