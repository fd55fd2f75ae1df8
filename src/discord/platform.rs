//! [`Platform`] over the Discord REST API.
//!
//! Channel and webhook management go through serenity's HTTP client.
//! Webhook executions are plain JSON posts with reqwest, so they do not need
//! the bot token and carry the relayed author's name and avatar.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serenity::async_trait;
use serenity::builder::{CreateChannel, CreateMessage, CreateWebhook};
use serenity::cache::Cache;
use serenity::http::{Http, HttpError};
use serenity::model::channel::{Channel, ChannelType, GuildChannel};
use serenity::model::webhook::Webhook;
use serenity::model::id::{
    ChannelId as DiscordChannelId, GuildId as DiscordGuildId, MessageId as DiscordMessageId,
};
use tracing::debug;

use crate::common::error::{RelayError, RelayResult};
use crate::common::types::{ChannelId, GuildId, MessageId};
use crate::relay::platform::{Platform, RelayEndpoint, RelayPayload, TextChannel};

/// Map a serenity error onto the relay taxonomy.
pub fn map_serenity_error(error: serenity::Error) -> RelayError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &error {
        match response.status_code.as_u16() {
            401 | 403 => return RelayError::permission(response.error.message.clone()),
            404 => return RelayError::not_found(response.error.message.clone()),
            _ => {}
        }
    }
    RelayError::transport(error.to_string())
}

fn map_status(status: u16, body: String) -> RelayResult<()> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(RelayError::permission(format!("webhook rejected: {}", body))),
        404 => Err(RelayError::not_found("webhook")),
        _ => Err(RelayError::transport(format!("webhook returned {}: {}", status, body))),
    }
}

fn is_text(channel: &GuildChannel) -> bool {
    matches!(channel.kind, ChannelType::Text | ChannelType::News)
}

fn to_text_channel(channel: &GuildChannel) -> TextChannel {
    TextChannel {
        id: channel.id.get(),
        name: channel.name.clone(),
    }
}

fn to_endpoint(webhook: &Webhook) -> Option<RelayEndpoint> {
    // Webhooks without a token (e.g. channel follower webhooks) cannot be executed.
    let url = webhook.url().ok()?;
    Some(RelayEndpoint {
        url,
        owner_id: webhook.user.as_ref().map(|u| u.id.get()),
    })
}

#[derive(Serialize)]
struct AllowedMentions {
    parse: [&'static str; 0],
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
    username: &'a str,
    avatar_url: &'a str,
    allowed_mentions: AllowedMentions,
}

pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: RwLock<Option<Arc<Cache>>>,
    user_id: AtomicU64,
    webhook_client: reqwest::Client,
}

impl SerenityPlatform {
    pub fn new(token: &str, call_timeout: Duration) -> anyhow::Result<Self> {
        let webhook_client = reqwest::Client::builder()
            .timeout(call_timeout)
            .connect_timeout(call_timeout)
            .build()?;

        Ok(Self {
            http: Arc::new(Http::new(token)),
            cache: RwLock::new(None),
            user_id: AtomicU64::new(0),
            webhook_client,
        })
    }

    /// Attach the gateway cache and the bot's user id once connected.
    pub fn attach(&self, cache: Arc<Cache>, user_id: u64) {
        self.user_id.store(user_id, Ordering::Relaxed);
        if let Ok(mut slot) = self.cache.write() {
            *slot = Some(cache);
        }
    }

    fn cache(&self) -> Option<Arc<Cache>> {
        self.cache.read().ok().and_then(|slot| slot.clone())
    }

    /// Cached view of a guild channel. `None` when the guild is not cached.
    fn cached_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Option<Option<TextChannel>> {
        let cache = self.cache()?;
        let guild = cache.guild(DiscordGuildId::new(guild_id))?;
        let channel = guild
            .channels
            .get(&DiscordChannelId::new(channel_id))
            .filter(|c| is_text(c))
            .map(to_text_channel);
        Some(channel)
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    fn self_user_id(&self) -> u64 {
        self.user_id.load(Ordering::Relaxed)
    }

    async fn text_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<Option<TextChannel>> {
        if let Some(cached) = self.cached_channel(guild_id, channel_id) {
            return Ok(cached);
        }

        match self.http.get_channel(DiscordChannelId::new(channel_id)).await {
            Ok(Channel::Guild(channel))
                if channel.guild_id.get() == guild_id && is_text(&channel) =>
            {
                Ok(Some(to_text_channel(&channel)))
            }
            Ok(_) => Ok(None),
            Err(e) => match map_serenity_error(e) {
                RelayError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn find_text_channel_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> RelayResult<Option<TextChannel>> {
        let mut channels = self
            .http
            .get_channels(DiscordGuildId::new(guild_id))
            .await
            .map_err(map_serenity_error)?;
        channels.sort_by_key(|c| (c.position, c.id));

        Ok(channels
            .iter()
            .find(|c| is_text(c) && c.name == name)
            .map(to_text_channel))
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        topic: &str,
        reason: &str,
    ) -> RelayResult<TextChannel> {
        let builder = CreateChannel::new(name)
            .kind(ChannelType::Text)
            .topic(topic)
            .audit_log_reason(reason);
        let channel = DiscordGuildId::new(guild_id)
            .create_channel(&self.http, builder)
            .await
            .map_err(map_serenity_error)?;
        Ok(to_text_channel(&channel))
    }

    async fn list_relay_endpoints(&self, channel_id: ChannelId) -> RelayResult<Vec<RelayEndpoint>> {
        let webhooks = DiscordChannelId::new(channel_id)
            .webhooks(&self.http)
            .await
            .map_err(map_serenity_error)?;
        Ok(webhooks.iter().filter_map(to_endpoint).collect())
    }

    async fn create_relay_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
    ) -> RelayResult<RelayEndpoint> {
        let webhook = DiscordChannelId::new(channel_id)
            .create_webhook(&self.http, CreateWebhook::new(name))
            .await
            .map_err(map_serenity_error)?;
        to_endpoint(&webhook).ok_or_else(|| RelayError::transport("created webhook has no token"))
    }

    async fn execute_relay(&self, url: &str, payload: &RelayPayload) -> RelayResult<()> {
        let body = WebhookBody {
            content: &payload.content,
            username: &payload.username,
            avatar_url: &payload.avatar_url,
            allowed_mentions: AllowedMentions { parse: [] },
        };

        let response = self
            .webhook_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("webhook request failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = if response.status().is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        debug!("Webhook execution returned {}", status);
        map_status(status, text)
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> RelayResult<()> {
        DiscordChannelId::new(channel_id)
            .send_message(&self.http, CreateMessage::new().content(content))
            .await
            .map_err(map_serenity_error)?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> RelayResult<()> {
        DiscordChannelId::new(channel_id)
            .delete_message(&self.http, DiscordMessageId::new(message_id))
            .await
            .map_err(map_serenity_error)
    }
}
