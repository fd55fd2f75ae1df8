//! Legacy single-channel guild settings.
//!
//! Older deployments stored one "links channel" per guild instead of a set of
//! output channels. The record is still readable and writable, and
//! [`migrate_legacy`] folds it into a regular output channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::error::{RelayResult, StoreError};
use crate::common::types::{ChannelId, GuildId};
use crate::links::CategoryPatch;
use crate::registry::destination::DestinationRegistry;
use crate::store::{SharedStore, StoreKey};

const SETTINGS_SORT_KEY: &str = "SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    #[serde(default)]
    pub links_channel_id: Option<ChannelId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn settings_key(guild_id: GuildId) -> StoreKey {
    StoreKey::new(StoreKey::guild_partition(guild_id), SETTINGS_SORT_KEY)
}

#[derive(Clone)]
pub struct GuildSettingsStore {
    store: SharedStore,
}

impl GuildSettingsStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, guild_id: GuildId) -> RelayResult<Option<GuildSettings>> {
        let key = settings_key(guild_id);
        let Some(item) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_value(item)
            .map(Some)
            .map_err(|e| StoreError::corrupt(&key, e).into())
    }

    /// The guild's legacy links channel, if one is set.
    pub async fn get_links_channel(&self, guild_id: GuildId) -> RelayResult<Option<ChannelId>> {
        Ok(self.get(guild_id).await?.and_then(|s| s.links_channel_id))
    }

    pub async fn set_links_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<()> {
        let now = Utc::now();
        let settings = match self.get(guild_id).await? {
            Some(existing) => GuildSettings {
                links_channel_id: Some(channel_id),
                updated_at: now,
                ..existing
            },
            None => GuildSettings {
                guild_id,
                links_channel_id: Some(channel_id),
                created_at: now,
                updated_at: now,
            },
        };

        let item = serde_json::to_value(&settings).map_err(StoreError::from)?;
        self.store.put(settings_key(guild_id), item).await?;

        info!("Set links channel {} for guild {}", channel_id, guild_id);
        Ok(())
    }

    pub async fn remove_links_channel(&self, guild_id: GuildId) -> RelayResult<bool> {
        let existed = self.store.delete(&settings_key(guild_id)).await?;
        if existed {
            info!("Removed links channel setting for guild {}", guild_id);
        }
        Ok(existed)
    }
}

/// Convert a legacy links channel into an output channel accepting everything.
///
/// Returns the migrated channel. An existing output channel for the same
/// channel keeps its flags; the legacy record is removed either way.
pub async fn migrate_legacy(
    settings: &GuildSettingsStore,
    registry: &DestinationRegistry,
    guild_id: GuildId,
) -> RelayResult<Option<ChannelId>> {
    let Some(channel_id) = settings.get_links_channel(guild_id).await? else {
        return Ok(None);
    };

    if registry.get(guild_id, channel_id).await?.is_none() {
        registry
            .upsert(guild_id, channel_id, &CategoryPatch::all_enabled())
            .await?;
        info!(
            "Migrated legacy links channel {} of guild {} to an output channel",
            channel_id, guild_id
        );
    } else {
        warn!(
            "Legacy links channel {} of guild {} already configured, dropping legacy setting",
            channel_id, guild_id
        );
    }

    settings.remove_links_channel(guild_id).await?;
    Ok(Some(channel_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::links::Category;
    use crate::store::{KeyValueStore, MemoryStore};

    fn stores() -> (GuildSettingsStore, DestinationRegistry) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        (
            GuildSettingsStore::new(store.clone()),
            DestinationRegistry::new(store),
        )
    }

    #[tokio::test]
    async fn test_links_channel_round_trip() {
        let (settings, _) = stores();
        assert_eq!(settings.get_links_channel(1).await.unwrap(), None);

        settings.set_links_channel(1, 50).await.unwrap();
        let first = settings.get(1).await.unwrap().unwrap();
        assert_eq!(first.links_channel_id, Some(50));

        settings.set_links_channel(1, 51).await.unwrap();
        let second = settings.get(1).await.unwrap().unwrap();
        assert_eq!(second.links_channel_id, Some(51));
        assert_eq!(second.created_at, first.created_at);

        assert!(settings.remove_links_channel(1).await.unwrap());
        assert_eq!(settings.get_links_channel(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_settings_do_not_show_up_as_destinations() {
        let (settings, registry) = stores();
        settings.set_links_channel(1, 50).await.unwrap();
        assert!(registry.list_for_guild(1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_legacy_creates_full_destination() {
        let (settings, registry) = stores();
        settings.set_links_channel(1, 50).await.unwrap();

        let migrated = migrate_legacy(&settings, &registry, 1).await.unwrap();
        assert_eq!(migrated, Some(50));

        let destination = registry.get(1, 50).await.unwrap().unwrap();
        assert!(Category::ALL.iter().all(|c| destination.accepts(*c)));
        assert_eq!(settings.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migrate_legacy_keeps_existing_flags() {
        let (settings, registry) = stores();
        registry
            .upsert(1, 50, &CategoryPatch::new().with(Category::Github, true))
            .await
            .unwrap();
        settings.set_links_channel(1, 50).await.unwrap();

        migrate_legacy(&settings, &registry, 1).await.unwrap();
        let destination = registry.get(1, 50).await.unwrap().unwrap();
        assert!(destination.flags.github);
        assert!(!destination.flags.youtube);
    }

    #[tokio::test]
    async fn test_migrate_without_legacy_is_noop() {
        let (settings, registry) = stores();
        assert_eq!(migrate_legacy(&settings, &registry, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_settings_are_reported() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store
            .put(settings_key(1), serde_json::json!({"links_channel_id": "fifty"}))
            .await
            .unwrap();
        let settings = GuildSettingsStore::new(store);

        let error = settings.get(1).await.unwrap_err();
        assert!(error.to_string().contains("Corrupt record GUILD#1/SETTINGS"), "{}", error);
    }
}
