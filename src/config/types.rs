//! Configuration type definitions.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_SUPPORT_URL: &str = "https://discord.gg/WYJUCbENFu";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    /// Prefix for text commands, e.g. `!list_link_channels`.
    pub command_prefix: String,
    /// Register the command table as global slash commands on startup.
    pub register_slash_commands: bool,
    pub support_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            command_prefix: "!".to_string(),
            register_slash_commands: true,
            support_url: DEFAULT_SUPPORT_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Memory,
}

/// Where output channel configuration is kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "file" or "memory".
    pub backend: String,
    pub path: String,
    /// Delete a guild's configuration when the bot leaves it.
    pub purge_on_guild_leave: bool,
}

impl StorageConfig {
    pub fn backend_kind(&self) -> Option<StorageBackend> {
        match self.backend.to_lowercase().as_str() {
            "file" => Some(StorageBackend::File),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: "data/linkrelay.json".to_string(),
            purge_on_guild_leave: true,
        }
    }
}

/// Relay behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Name given to webhooks the bot creates.
    pub webhook_name: String,
    /// Upper bound for each external call made while routing a message.
    pub call_timeout_secs: u64,
    /// Channel name used by quick setup when none is given.
    pub default_channel_name: String,
}

impl RelayConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webhook_name: "Link Monitor".to_string(),
            call_timeout_secs: 10,
            default_channel_name: "links".to_string(),
        }
    }
}
