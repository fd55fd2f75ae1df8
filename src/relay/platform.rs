//! Messaging platform contract.
//!
//! Everything the relay pipeline and the admin commands need from Discord,
//! behind a trait so routing can run against a scripted platform in tests.

use std::sync::Arc;

use serenity::async_trait;

use crate::common::error::RelayResult;
use crate::common::types::{ChannelId, GuildId, MessageId};

/// A guild text channel that can receive relayed links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChannel {
    pub id: ChannelId,
    pub name: String,
}

/// A relay endpoint (webhook) attached to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    /// Executable URL including the webhook token.
    pub url: String,
    /// User that created the webhook, if known.
    pub owner_id: Option<u64>,
}

/// Body and attribution of one relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPayload {
    pub content: String,
    pub username: String,
    pub avatar_url: String,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// The bot's own user id, used to recognise webhooks it created.
    fn self_user_id(&self) -> u64;

    /// Look up a text channel. `None` if it is gone or not a text channel.
    async fn text_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<Option<TextChannel>>;

    async fn find_text_channel_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> RelayResult<Option<TextChannel>>;

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        topic: &str,
        reason: &str,
    ) -> RelayResult<TextChannel>;

    async fn list_relay_endpoints(&self, channel_id: ChannelId) -> RelayResult<Vec<RelayEndpoint>>;

    async fn create_relay_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
    ) -> RelayResult<RelayEndpoint>;

    async fn execute_relay(&self, url: &str, payload: &RelayPayload) -> RelayResult<()>;

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> RelayResult<()>;

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> RelayResult<()>;
}

pub type SharedPlatform = Arc<dyn Platform>;
