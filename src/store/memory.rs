//! In-memory store, used when persistence is disabled and in tests.

use std::collections::BTreeMap;

use serde_json::Value;
use serenity::async_trait;
use tokio::sync::RwLock;

use crate::common::error::StoreResult;
use crate::store::{KeyValueStore, StoreKey, StoredItem};

/// Ordered map keyed by `(pk, sk)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<StoreKey, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with records.
    pub fn from_items(items: Vec<StoredItem>) -> Self {
        let map = items.into_iter().map(|s| (s.key, s.item)).collect();
        Self {
            items: RwLock::new(map),
        }
    }

    /// Snapshot of every record, ordered by key.
    pub async fn snapshot(&self) -> Vec<StoredItem> {
        self.items
            .read()
            .await
            .iter()
            .map(|(key, item)| StoredItem {
                key: key.clone(),
                item: item.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Value>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn put(&self, key: StoreKey, item: Value) -> StoreResult<()> {
        self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn delete(&self, key: &StoreKey) -> StoreResult<bool> {
        Ok(self.items.write().await.remove(key).is_some())
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> StoreResult<Vec<StoredItem>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|(key, _)| key.pk == pk && key.sk.starts_with(sk_prefix))
            .map(|(key, item)| StoredItem {
                key: key.clone(),
                item: item.clone(),
            })
            .collect())
    }

    async fn scan_all(&self) -> StoreResult<Vec<StoredItem>> {
        Ok(self.snapshot().await)
    }
}
