// File-backed durable store
// Author: wiredFRONT contributors
//
// Layout under the root directory:
//   meta.json                      {"version": N}
//   <table>/<sha256(key)>.json     {"key": "...", "value": ...}
//
// Keys are hashed so arbitrary session ids map to safe file names. Writes go
// to a temp file in the same directory and are renamed into place.

use super::{DurableStore, Table, Upgrade};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

const META_FILE: &str = "meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    key: String,
    value: Value,
}

/// Store with one JSON document per key.
pub struct FileStore {
    root: PathBuf,
    version: u32,
    tmp_counter: AtomicU64,
}

impl FileStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// When the version on disk is lower than `version`, `upgrade` is called
    /// with the old and new versions and any tables it clears are emptied
    /// before the new version is recorded.
    pub async fn open<F>(root: impl Into<PathBuf>, version: u32, upgrade: F) -> Result<Self>
    where
        F: FnOnce(&mut Upgrade),
    {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            CacheError::Storage(format!("cannot create {}: {}", root.display(), e))
        })?;

        let store = Self {
            root,
            version,
            tmp_counter: AtomicU64::new(0),
        };

        let stored = store.read_version().await?;
        if stored > version {
            return Err(CacheError::SchemaVersion {
                stored,
                requested: version,
            });
        }

        if stored < version {
            info!(
                "Upgrading store at {} from version {} to {}",
                store.root.display(),
                stored,
                version
            );
            let mut step = Upgrade::new(stored, version);
            upgrade(&mut step);
            for table in step.into_cleared() {
                store.clear(table).await?;
            }
            let meta = serde_json::to_vec(&Meta { version })?;
            store.write_atomic(&store.root.join(META_FILE), &meta).await?;
        }

        for table in Table::ALL {
            fs::create_dir_all(store.table_dir(table)).await?;
        }

        debug!("Opened file store at {} (version {})", store.root.display(), version);
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_version(&self) -> Result<u32> {
        match fs::read(self.root.join(META_FILE)).await {
            Ok(bytes) => {
                let meta: Meta = serde_json::from_slice(&bytes).map_err(|e| {
                    CacheError::Storage(format!("corrupt {}: {}", META_FILE, e))
                })?;
                Ok(meta.version)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn table_dir(&self, table: Table) -> PathBuf {
        self.root.join(table.name())
    }

    fn entry_path(&self, table: Table, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.table_dir(table).join(format!("{}.json", digest))
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = parent.join(format!(
            ".{}.tmp.{}.{}",
            path.file_name().and_then(|s| s.to_str()).unwrap_or("entry"),
            std::process::id(),
            n
        ));

        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    fn version(&self) -> u32 {
        self.version
    }

    async fn get(&self, table: Table, key: &str) -> Result<Option<Value>> {
        let bytes = match fs::read(self.entry_path(table, key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let envelope: Envelope = serde_json::from_slice(&bytes)?;
        Ok(Some(envelope.value))
    }

    async fn put(&self, table: Table, key: &str, value: Value) -> Result<()> {
        let path = self.entry_path(table, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let envelope = Envelope {
            key: key.to_string(),
            value,
        };
        let content = serde_json::to_vec(&envelope)?;
        self.write_atomic(&path, &content).await
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(table, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, table: Table) -> Result<()> {
        let dir = self.table_dir(table);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn entries(&self, table: Table) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        let mut dir = match fs::read_dir(self.table_dir(table)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(envelope) => out.push((envelope.key, envelope.value)),
                Err(e) => warn!("Skipping unreadable entry {}: {}", path.display(), e),
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
