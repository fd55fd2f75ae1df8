//! Key-value persistence.
//!
//! Records live under a partition key (`GUILD#<id>`) and a sort key
//! (`CHANNEL#<id>` or `SETTINGS`). The registry only needs point reads and
//! writes, prefix queries within one partition, and a full scan.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::async_trait;

use crate::common::error::StoreResult;
use crate::common::types::GuildId;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Composite record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub pk: String,
    pub sk: String,
}

impl StoreKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Partition key for everything belonging to a guild.
    pub fn guild_partition(guild_id: GuildId) -> String {
        format!("GUILD#{}", guild_id)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}

/// A stored record with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub key: StoreKey,
    pub item: Value,
}

/// Persistence contract consumed by the registry.
///
/// Single-key operations are atomic; nothing spans keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> StoreResult<Option<Value>>;

    async fn put(&self, key: StoreKey, item: Value) -> StoreResult<()>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, key: &StoreKey) -> StoreResult<bool>;

    /// All records in partition `pk` whose sort key starts with `sk_prefix`, ordered by sort key.
    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> StoreResult<Vec<StoredItem>>;

    /// Every record in the store.
    async fn scan_all(&self) -> StoreResult<Vec<StoredItem>>;
}

/// Shared store handle.
pub type SharedStore = Arc<dyn KeyValueStore>;
