//! Gateway connection and event loop.
//!
//! serenity callbacks only forward events into a channel; a single loop
//! drains it and hands work to [`LinkHandler`], spawning message and
//! interaction handling so a slow delivery never blocks the gateway.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::{Guild, UnavailableGuild};
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::admin::AdminService;
use crate::config::types::Config;
use crate::discord::handler::{HandlerOptions, LinkHandler};
use crate::discord::platform::SerenityPlatform;
use crate::registry::{DestinationRegistry, GuildSettingsStore};
use crate::relay::LinkRouter;
use crate::store::SharedStore;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Gateway events the bot reacts to.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready { context: Context, ready: Ready },
    GuildCreate { guild: Guild },
    /// Removed from a guild, or the guild went unavailable.
    GuildDelete { incomplete: UnavailableGuild },
    Message { context: Context, message: Message },
    /// Slash command or other interaction.
    Interaction { context: Context, interaction: Interaction },
    /// The shard runner stopped; a reconnect follows unless shutting down.
    ConnectionLost,
}

type EventSender = mpsc::UnboundedSender<GatewayEvent>;

fn forward(events: &EventSender, event: GatewayEvent) {
    if events.send(event).is_err() {
        warn!("Gateway event dropped: event loop is gone");
    }
}

struct EventForwarder {
    events: EventSender,
}

#[async_trait]
impl EventHandler for EventForwarder {
    async fn ready(&self, context: Context, ready: Ready) {
        forward(&self.events, GatewayEvent::Ready { context, ready });
    }

    async fn guild_create(&self, _context: Context, guild: Guild, _is_new: Option<bool>) {
        forward(&self.events, GatewayEvent::GuildCreate { guild });
    }

    async fn guild_delete(
        &self,
        _context: Context,
        incomplete: UnavailableGuild,
        _full: Option<Guild>,
    ) {
        forward(&self.events, GatewayEvent::GuildDelete { incomplete });
    }

    async fn message(&self, context: Context, message: Message) {
        forward(&self.events, GatewayEvent::Message { context, message });
    }

    async fn interaction_create(&self, context: Context, interaction: Interaction) {
        forward(&self.events, GatewayEvent::Interaction { context, interaction });
    }
}

/// Wires the relay pipeline onto a serenity client.
pub struct DiscordBotBuilder {
    config: Config,
    store: SharedStore,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBotBuilder {
    pub fn new(config: Config, store: SharedStore, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            config,
            store,
            shutdown_rx,
        }
    }

    pub async fn build(self) -> anyhow::Result<DiscordBot> {
        let Config { discord, storage, relay } = self.config;
        let call_timeout = relay.call_timeout();

        let platform = Arc::new(SerenityPlatform::new(&discord.token, call_timeout)?);
        let registry = DestinationRegistry::new(self.store.clone());
        let settings = GuildSettingsStore::new(self.store);

        let router = LinkRouter::new(
            registry.clone(),
            platform.clone(),
            relay.webhook_name,
            call_timeout,
        );
        let admin = AdminService::new(
            registry.clone(),
            platform.clone(),
            discord.command_prefix.clone(),
            discord.support_url,
            relay.default_channel_name,
        );
        let options = HandlerOptions {
            command_prefix: discord.command_prefix,
            register_slash_commands: discord.register_slash_commands,
            purge_on_guild_leave: storage.purge_on_guild_leave,
        };
        let handler = LinkHandler::new(router, admin, registry, settings, platform, options);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = connect_client(&discord.token, events_tx.clone()).await?;

        Ok(DiscordBot {
            client: Some(client),
            token: discord.token,
            handler,
            events_rx,
            events_tx,
            shutdown_rx: self.shutdown_rx,
        })
    }
}

async fn connect_client(token: &str, events: EventSender) -> anyhow::Result<Client> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let client = Client::builder(token, intents)
        .event_handler(EventForwarder { events })
        .await?;
    Ok(client)
}

/// Reconnect delays: 5s growing by 1.1x with jitter, capped at 5 minutes, forever.
fn reconnect_delays() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    handler: LinkHandler,
    events_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    events_tx: EventSender,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordBot {
    /// Run until shutdown is requested or the gateway closes for good.
    pub async fn run(mut self) {
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let mut stop_rx = self.shutdown_rx.clone();

        tokio::select! {
            _ = Self::keep_connected(&mut self.client, &self.token, &self.events_tx) => {},
            _ = Self::event_loop(&mut self.events_rx, &self.handler, &mut self.shutdown_rx) => {},
            _ = wait_for_shutdown(&mut stop_rx) => {
                if let Some(manager) = shard_manager {
                    info!("Closing Discord shards...");
                    manager.shutdown_all().await;
                }
            }
        }
        info!("Discord bot stopped");
    }

    async fn keep_connected(slot: &mut Option<Client>, token: &str, events: &EventSender) {
        let mut delays = reconnect_delays();

        loop {
            let client = match slot.take() {
                Some(client) => Ok(client),
                None => connect_client(token, events.clone()).await,
            };
            let mut client = match client {
                Ok(client) => client,
                Err(e) => {
                    let delay = delays.next().unwrap_or(MAX_RECONNECT_DELAY);
                    error!(
                        "Could not create Discord client, retrying in {:.1}s: {}",
                        delay.as_secs_f64(),
                        e
                    );
                    sleep(delay).await;
                    continue;
                }
            };

            info!("Connecting to Discord...");
            let outcome = client.start().await;
            forward(events, GatewayEvent::ConnectionLost);

            match outcome {
                Ok(()) => {
                    info!("Discord gateway closed");
                    return;
                }
                Err(e) => {
                    let delay = delays.next().unwrap_or(MAX_RECONNECT_DELAY);
                    warn!(
                        "Discord connection failed ({}), reconnecting in {:.1}s",
                        e,
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn event_loop(
        events: &mut mpsc::UnboundedReceiver<GatewayEvent>,
        handler: &LinkHandler,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = wait_for_shutdown(shutdown_rx) => {
                    debug!("Event loop stopping for shutdown");
                    return;
                }
            };
            let Some(event) = event else {
                debug!("Gateway event channel closed");
                return;
            };

            match event {
                GatewayEvent::Ready { context, ready } => {
                    handler.handle_ready(&context, &ready).await
                }
                GatewayEvent::GuildCreate { guild } => handler.handle_guild_create(&guild).await,
                GatewayEvent::GuildDelete { incomplete } => {
                    handler.handle_guild_delete(&incomplete).await
                }
                GatewayEvent::Message { context, message } => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler.handle_message(&context, &message).await;
                    });
                }
                GatewayEvent::Interaction { context, interaction } => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        handler.handle_interaction(&context, interaction).await;
                    });
                }
                GatewayEvent::ConnectionLost => debug!("Discord connection lost"),
            }
        }
    }
}

/// Resolves once `true` is published, or when the sender is dropped.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
