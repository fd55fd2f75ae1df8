//! Output channel ("destination") records.
//!
//! One record per (guild, channel) holding the enabled categories and the
//! cached webhook URL used to relay into that channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::common::error::{RelayError, RelayResult, StoreError};
use crate::common::types::{ChannelId, GuildId};
use crate::links::{Category, CategoryFlags, CategoryPatch};
use crate::store::{SharedStore, StoreKey, StoredItem};

const CHANNEL_PREFIX: &str = "CHANNEL#";

/// A configured output channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    /// Cached relay endpoint, filled in lazily on first delivery.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(flatten)]
    pub flags: CategoryFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Destination {
    fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        let now = Utc::now();
        Self {
            guild_id,
            channel_id,
            webhook_url: None,
            flags: CategoryFlags::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn accepts(&self, category: Category) -> bool {
        self.flags.get(category)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn destination_key(guild_id: GuildId, channel_id: ChannelId) -> StoreKey {
    StoreKey::new(
        StoreKey::guild_partition(guild_id),
        format!("{}{}", CHANNEL_PREFIX, channel_id),
    )
}

fn parse_item(stored: StoredItem) -> Option<Destination> {
    match serde_json::from_value::<Destination>(stored.item) {
        Ok(destination) => Some(destination),
        Err(e) => {
            error!("Failed to parse output channel record {}: {}", stored.key, e);
            None
        }
    }
}

/// Registry of output channels backed by the key-value store.
///
/// Mutations are read-modify-write without version checks; concurrent
/// writers to the same record resolve as last writer wins.
#[derive(Clone)]
pub struct DestinationRegistry {
    store: SharedStore,
}

impl DestinationRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn save(&self, destination: &Destination) -> RelayResult<()> {
        let item = serde_json::to_value(destination).map_err(StoreError::from)?;
        self.store
            .put(destination_key(destination.guild_id, destination.channel_id), item)
            .await?;
        Ok(())
    }

    /// Fetch a single record.
    pub async fn get(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<Option<Destination>> {
        let key = destination_key(guild_id, channel_id);
        let Some(item) = self.store.get(&key).await? else {
            return Ok(None);
        };

        serde_json::from_value(item)
            .map(Some)
            .map_err(|e| StoreError::corrupt(&key, e).into())
    }

    /// Create or update a record, merging `patch` into the stored flags.
    pub async fn upsert(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        patch: &CategoryPatch,
    ) -> RelayResult<Destination> {
        let mut destination = match self.get(guild_id, channel_id).await? {
            Some(mut existing) => {
                existing.touch();
                existing
            }
            None => Destination::new(guild_id, channel_id),
        };

        patch.apply(&mut destination.flags);
        self.save(&destination).await?;

        info!("Updated output channel {} for guild {}", channel_id, guild_id);
        Ok(destination)
    }

    /// All records of a guild, optionally only those accepting `category`.
    pub async fn list_for_guild(
        &self,
        guild_id: GuildId,
        category: Option<Category>,
    ) -> RelayResult<Vec<Destination>> {
        let items = self
            .store
            .query_prefix(&StoreKey::guild_partition(guild_id), CHANNEL_PREFIX)
            .await?;

        Ok(items
            .into_iter()
            .filter_map(parse_item)
            .filter(|d| category.map_or(true, |c| d.accepts(c)))
            .collect())
    }

    /// Every record across all guilds.
    pub async fn list_all(&self) -> RelayResult<Vec<Destination>> {
        let items = self.store.scan_all().await?;
        Ok(items
            .into_iter()
            .filter(|s| s.key.sk.starts_with(CHANNEL_PREFIX))
            .filter_map(parse_item)
            .collect())
    }

    /// Delete a record. Returns whether one existed.
    pub async fn remove(&self, guild_id: GuildId, channel_id: ChannelId) -> RelayResult<bool> {
        let existed = self
            .store
            .delete(&destination_key(guild_id, channel_id))
            .await?;

        if existed {
            info!("Removed output channel {} for guild {}", channel_id, guild_id);
        } else {
            debug!("No output channel {} to remove in guild {}", channel_id, guild_id);
        }
        Ok(existed)
    }

    /// Flip a single category on an existing record.
    pub async fn set_category(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        category: Category,
        enabled: bool,
    ) -> RelayResult<Destination> {
        let mut destination = self
            .get(guild_id, channel_id)
            .await?
            .ok_or_else(|| RelayError::not_found(format!("output channel {}", channel_id)))?;

        destination.flags.set(category, enabled);
        destination.touch();
        self.save(&destination).await?;

        info!(
            "Set {} = {} on output channel {} for guild {}",
            category, enabled, channel_id, guild_id
        );
        Ok(destination)
    }

    /// Store (or clear) the cached webhook URL.
    pub async fn set_relay_handle(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        webhook_url: Option<String>,
    ) -> RelayResult<()> {
        let mut destination = self
            .get(guild_id, channel_id)
            .await?
            .ok_or_else(|| RelayError::not_found(format!("output channel {}", channel_id)))?;

        destination.webhook_url = webhook_url;
        destination.touch();
        self.save(&destination).await
    }

    pub async fn get_relay_handle(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<Option<String>> {
        Ok(self
            .get(guild_id, channel_id)
            .await?
            .and_then(|d| d.webhook_url))
    }

    /// Delete every record stored for a guild, legacy settings included.
    pub async fn purge_guild(&self, guild_id: GuildId) -> RelayResult<usize> {
        let items = self
            .store
            .query_prefix(&StoreKey::guild_partition(guild_id), "")
            .await?;

        let mut removed = 0;
        for stored in items {
            match self.store.delete(&stored.key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to delete {} while purging guild: {}", stored.key, e),
            }
        }

        info!("Cleared {} records for guild {}", removed, guild_id);
        Ok(removed)
    }
}
