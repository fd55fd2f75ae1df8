//! Scripted in-memory platform for relay and admin tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serenity::async_trait;

use crate::common::error::{RelayError, RelayResult};
use crate::common::types::{Author, ChannelId, GuildId, IncomingMessage, MessageId};
use crate::relay::platform::{Platform, RelayEndpoint, RelayPayload, TextChannel};

pub const BOT_USER_ID: u64 = 999;

pub fn test_author() -> Author {
    Author {
        display_name: "alice".to_string(),
        avatar_url: "https://cdn.discordapp.com/avatars/1/a.png".to_string(),
    }
}

pub fn test_message(guild_id: GuildId, content: &str) -> IncomingMessage {
    IncomingMessage {
        guild_id,
        channel_id: 500,
        message_id: 7000,
        author: test_author(),
        content: content.to_string(),
    }
}

#[derive(Default)]
struct State {
    channels: HashMap<ChannelId, (GuildId, String)>,
    webhooks: HashMap<ChannelId, Vec<RelayEndpoint>>,
    created_webhooks: Vec<(ChannelId, String)>,
    created_channels: Vec<(GuildId, String, String)>,
    deliveries: Vec<(String, RelayPayload)>,
    sent: Vec<(ChannelId, String)>,
    deleted: Vec<(ChannelId, MessageId)>,
    list_calls: usize,
    next_id: u64,

    webhook_failures: HashMap<ChannelId, RelayError>,
    /// Per webhook URL: successful calls still allowed, then the error.
    execute_failures: HashMap<String, (usize, RelayError)>,
    call_delay: Option<Duration>,
    channel_create_failure: Option<RelayError>,
    delete_failure: Option<RelayError>,
}

/// Records every call and fails where a test scripted it to.
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 10_000,
                ..State::default()
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_channel(&self, guild_id: GuildId, channel_id: ChannelId, name: &str) {
        self.with(|s| s.channels.insert(channel_id, (guild_id, name.to_string())));
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        self.with(|s| s.channels.remove(&channel_id));
    }

    pub fn add_webhook(&self, channel_id: ChannelId, endpoint: RelayEndpoint) {
        self.with(|s| s.webhooks.entry(channel_id).or_default().push(endpoint));
    }

    /// Make listing and creating webhooks on `channel_id` fail.
    pub fn fail_webhooks(&self, channel_id: ChannelId, error: RelayError) {
        self.with(|s| s.webhook_failures.insert(channel_id, error));
    }

    pub fn fail_execute(&self, url: &str, error: RelayError) {
        self.fail_execute_after(url, 0, error);
    }

    /// Let `successes` deliveries to `url` through, then fail every later one.
    pub fn fail_execute_after(&self, url: &str, successes: usize, error: RelayError) {
        self.with(|s| s.execute_failures.insert(url.to_string(), (successes, error)));
    }

    /// Delay webhook listing, creation and execution by `delay` each.
    pub fn slow_calls(&self, delay: Duration) {
        self.with(|s| s.call_delay = Some(delay));
    }

    async fn pause(&self) {
        if let Some(delay) = self.with(|s| s.call_delay) {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn fail_channel_create(&self, error: RelayError) {
        self.with(|s| s.channel_create_failure = Some(error));
    }

    pub fn fail_delete(&self, error: RelayError) {
        self.with(|s| s.delete_failure = Some(error));
    }

    pub fn created_webhooks(&self) -> Vec<(ChannelId, String)> {
        self.with(|s| s.created_webhooks.clone())
    }

    pub fn created_channels(&self) -> Vec<(GuildId, String, String)> {
        self.with(|s| s.created_channels.clone())
    }

    pub fn deliveries(&self) -> Vec<(String, RelayPayload)> {
        self.with(|s| s.deliveries.clone())
    }

    /// Delivered content grouped per webhook URL, in delivery order.
    pub fn delivered_to(&self, url: &str) -> Vec<String> {
        self.with(|s| {
            s.deliveries
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, p)| p.content.clone())
                .collect()
        })
    }

    pub fn sent_messages(&self) -> Vec<(ChannelId, String)> {
        self.with(|s| s.sent.clone())
    }

    pub fn deleted(&self) -> Vec<(ChannelId, MessageId)> {
        self.with(|s| s.deleted.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.with(|s| s.list_calls)
    }

    pub fn webhook_url_for(channel_id: ChannelId) -> String {
        format!("https://discord.test/api/webhooks/{}/token", channel_id)
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn self_user_id(&self) -> u64 {
        BOT_USER_ID
    }

    async fn text_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> RelayResult<Option<TextChannel>> {
        Ok(self.with(|s| {
            s.channels
                .get(&channel_id)
                .filter(|(g, _)| *g == guild_id)
                .map(|(_, name)| TextChannel {
                    id: channel_id,
                    name: name.clone(),
                })
        }))
    }

    async fn find_text_channel_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> RelayResult<Option<TextChannel>> {
        Ok(self.with(|s| {
            let mut matches: Vec<_> = s
                .channels
                .iter()
                .filter(|(_, (g, n))| *g == guild_id && n == name)
                .map(|(id, (_, n))| TextChannel {
                    id: *id,
                    name: n.clone(),
                })
                .collect();
            matches.sort_by_key(|c| c.id);
            matches.into_iter().next()
        }))
    }

    async fn create_text_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        topic: &str,
        _reason: &str,
    ) -> RelayResult<TextChannel> {
        self.with(|s| {
            if let Some(error) = &s.channel_create_failure {
                return Err(error.clone());
            }
            s.next_id += 1;
            let id = s.next_id;
            s.channels.insert(id, (guild_id, name.to_string()));
            s.created_channels
                .push((guild_id, name.to_string(), topic.to_string()));
            Ok(TextChannel {
                id,
                name: name.to_string(),
            })
        })
    }

    async fn list_relay_endpoints(&self, channel_id: ChannelId) -> RelayResult<Vec<RelayEndpoint>> {
        self.pause().await;
        self.with(|s| {
            s.list_calls += 1;
            if let Some(error) = s.webhook_failures.get(&channel_id) {
                return Err(error.clone());
            }
            Ok(s.webhooks.get(&channel_id).cloned().unwrap_or_default())
        })
    }

    async fn create_relay_endpoint(
        &self,
        channel_id: ChannelId,
        name: &str,
    ) -> RelayResult<RelayEndpoint> {
        self.pause().await;
        self.with(|s| {
            if let Some(error) = s.webhook_failures.get(&channel_id) {
                return Err(error.clone());
            }
            let endpoint = RelayEndpoint {
                url: FakePlatform::webhook_url_for(channel_id),
                owner_id: Some(BOT_USER_ID),
            };
            s.webhooks.entry(channel_id).or_default().push(endpoint.clone());
            s.created_webhooks.push((channel_id, name.to_string()));
            Ok(endpoint)
        })
    }

    async fn execute_relay(&self, url: &str, payload: &RelayPayload) -> RelayResult<()> {
        self.pause().await;
        self.with(|s| {
            if let Some((successes, error)) = s.execute_failures.get_mut(url) {
                if *successes == 0 {
                    return Err(error.clone());
                }
                *successes -= 1;
            }
            s.deliveries.push((url.to_string(), payload.clone()));
            Ok(())
        })
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> RelayResult<()> {
        self.with(|s| s.sent.push((channel_id, content.to_string())));
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> RelayResult<()> {
        self.with(|s| {
            if let Some(error) = &s.delete_failure {
                return Err(error.clone());
            }
            s.deleted.push((channel_id, message_id));
            Ok(())
        })
    }
}
