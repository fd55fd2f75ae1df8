//! JSON file backed store.
//!
//! Keeps every record in memory and rewrites the whole file on each
//! mutation (write to a temp file, then rename). The in-memory copy only
//! changes once the file is written. The data set is one small record per
//! configured output channel, so a full rewrite is fine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use serenity::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::common::error::{StoreError, StoreResult};
use crate::store::memory::MemoryStore;
use crate::store::{KeyValueStore, StoreKey, StoredItem};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Serializes persist-then-commit so snapshots hit the disk in order.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing records if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let items = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<StoredItem>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store file {} does not exist yet, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(io_error(&path, e)),
        };

        info!("Loaded {} records from {}", items.len(), path.display());

        Ok(Self {
            path,
            inner: MemoryStore::from_items(items),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current records, to be changed and persisted before committing.
    async fn staged(&self) -> BTreeMap<StoreKey, Value> {
        self.inner
            .snapshot()
            .await
            .into_iter()
            .map(|stored| (stored.key, stored.item))
            .collect()
    }

    async fn persist(&self, records: BTreeMap<StoreKey, Value>) -> StoreResult<()> {
        let snapshot: Vec<StoredItem> = records
            .into_iter()
            .map(|(key, item)| StoredItem { key, item })
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!("Persisted {} records to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Value>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: StoreKey, item: Value) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.staged().await;
        records.insert(key.clone(), item.clone());
        self.persist(records).await?;
        self.inner.put(key, item).await
    }

    async fn delete(&self, key: &StoreKey) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.staged().await;
        if records.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(records).await?;
        self.inner.delete(key).await
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> StoreResult<Vec<StoredItem>> {
        self.inner.query_prefix(pk, sk_prefix).await
    }

    async fn scan_all(&self) -> StoreResult<Vec<StoredItem>> {
        self.inner.scan_all().await
    }
}
