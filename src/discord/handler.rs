//! Discord event handling.
//!
//! Turns gateway events into relay and admin operations: guild messages go
//! through the router, prefix and slash commands through the admin service,
//! guild joins run the legacy migration and guild removals purge storage.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::builder::{CreateInteractionResponseFollowup, EditInteractionResponse};
use serenity::model::application::{Command, CommandInteraction, Interaction};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::{Guild, UnavailableGuild};
use serenity::model::id::GuildId as DiscordGuildId;
use serenity::model::permissions::Permissions;
use serenity::model::Timestamp;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::admin::{find_command, AdminService, Invocation};
use crate::common::types::{Author, IncomingMessage};
use crate::discord::commands::{parse_prefix_command, slash_args, slash_commands};
use crate::discord::platform::SerenityPlatform;
use crate::registry::{migrate_legacy, DestinationRegistry, GuildSettingsStore};
use crate::relay::dispatcher::{split_content, MAX_CONTENT_LEN};
use crate::relay::LinkRouter;

/// Name shown on relayed messages: nickname, then global name, then username.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.filter(|n| !n.is_empty())
        .or(global_name.filter(|n| !n.is_empty()))
        .unwrap_or(username)
        .to_string()
}

fn author_identity(msg: &Message) -> Author {
    let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
    Author {
        display_name: display_name(nick, msg.author.global_name.as_deref(), &msg.author.name),
        avatar_url: msg
            .author
            .avatar_url()
            .unwrap_or_else(|| msg.author.default_avatar_url()),
    }
}

/// Convert a Discord timestamp, falling back to whole seconds.
fn to_utc(timestamp: Timestamp) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&timestamp.to_string())
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| DateTime::from_timestamp(timestamp.unix_timestamp(), 0))
        .unwrap_or_else(Utc::now)
}

fn can_manage(permissions: Permissions) -> bool {
    permissions.contains(Permissions::MANAGE_CHANNELS)
        || permissions.contains(Permissions::ADMINISTRATOR)
}

/// Settings the handler needs from the config.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub command_prefix: String,
    pub register_slash_commands: bool,
    pub purge_on_guild_leave: bool,
}

#[derive(Clone)]
pub struct LinkHandler {
    router: LinkRouter,
    admin: AdminService,
    registry: DestinationRegistry,
    settings: GuildSettingsStore,
    platform: Arc<SerenityPlatform>,
    options: HandlerOptions,
}

impl LinkHandler {
    pub fn new(
        router: LinkRouter,
        admin: AdminService,
        registry: DestinationRegistry,
        settings: GuildSettingsStore,
        platform: Arc<SerenityPlatform>,
        options: HandlerOptions,
    ) -> Self {
        Self {
            router,
            admin,
            registry,
            settings,
            platform,
            options,
        }
    }

    pub async fn handle_ready(&self, ctx: &Context, ready: &Ready) {
        info!("Discord bot connected as {}", ready.user.name);
        self.platform.attach(ctx.cache.clone(), ready.user.id.get());

        match self.registry.list_all().await {
            Ok(destinations) => info!("{} output channel(s) configured", destinations.len()),
            Err(e) => error!("Failed to load output channels: {}", e),
        }

        if self.options.register_slash_commands {
            match Command::set_global_commands(&ctx.http, slash_commands()).await {
                Ok(commands) => info!("Registered {} slash commands", commands.len()),
                Err(e) => error!("Failed to register slash commands: {}", e),
            }
        }
    }

    pub async fn handle_guild_create(&self, guild: &Guild) {
        info!("Received guild data for '{}' ({} channels)", guild.name, guild.channels.len());

        match migrate_legacy(&self.settings, &self.registry, guild.id.get()).await {
            Ok(Some(channel_id)) => info!(
                "Migrated legacy links channel {} for '{}'",
                channel_id, guild.name
            ),
            Ok(None) => {}
            Err(e) => error!("Legacy migration failed for guild {}: {}", guild.id, e),
        }
    }

    pub async fn handle_guild_delete(&self, incomplete: &UnavailableGuild) {
        if incomplete.unavailable {
            warn!("Guild {} became unavailable", incomplete.id);
            return;
        }

        info!("Removed from guild {}", incomplete.id);
        if !self.options.purge_on_guild_leave {
            return;
        }
        if let Err(e) = self.registry.purge_guild(incomplete.id.get()).await {
            error!("Failed to clear data for guild {}: {}", incomplete.id, e);
        }
    }

    pub async fn handle_message(&self, ctx: &Context, msg: &Message) {
        // Bots, this bot and webhooks included.
        if msg.author.bot {
            return;
        }

        if let Some((spec, raw)) = parse_prefix_command(&msg.content, &self.options.command_prefix)
        {
            let invocation = Invocation {
                guild_id: msg.guild_id.map(|g| g.get()),
                channel_id: msg.channel_id.get(),
                author_name: msg.author.name.clone(),
                sent_at: to_utc(msg.timestamp),
                can_manage_channels: self.member_can_manage(ctx, msg).await,
            };
            let reply = self.admin.dispatch_prefix(&invocation, spec, raw).await;
            for chunk in split_content(&reply, MAX_CONTENT_LEN) {
                if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                    error!("Failed to send command reply: {}", e);
                    break;
                }
            }
            return;
        }

        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let incoming = IncomingMessage {
            guild_id: guild_id.get(),
            channel_id: msg.channel_id.get(),
            message_id: msg.id.get(),
            author: author_identity(msg),
            content: msg.content.clone(),
        };

        if let Some(result) = self.router.process_message(&incoming).await {
            let reached = result.outcomes.iter().filter(|o| o.reached()).count();
            info!(
                guild_id = incoming.guild_id,
                "Routed links from {}: {}/{} output channel(s) reached, source deleted: {}",
                msg.author.name,
                reached,
                result.outcomes.len(),
                result.source_deleted
            );
        }
    }

    async fn member_can_manage(&self, ctx: &Context, msg: &Message) -> bool {
        let Some(guild_id) = msg.guild_id else {
            return false;
        };
        let member = match msg.member(ctx).await {
            Ok(member) => member,
            Err(e) => {
                warn!("Could not fetch member {}: {}", msg.author.id, e);
                return false;
            }
        };

        let permissions = ctx
            .cache
            .guild(DiscordGuildId::new(guild_id.get()))
            .map(|guild| guild.member_permissions(&member));
        permissions.map(can_manage).unwrap_or(false)
    }

    pub async fn handle_interaction(&self, ctx: &Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(spec) = find_command(&command.data.name) else {
            debug!("Ignoring unknown slash command {}", command.data.name);
            return;
        };

        if let Err(e) = command.defer_ephemeral(&ctx.http).await {
            error!("Failed to acknowledge /{}: {}", spec.name, e);
            return;
        }

        let invocation = Invocation {
            guild_id: command.guild_id.map(|g| g.get()),
            channel_id: command.channel_id.get(),
            author_name: command.user.name.clone(),
            sent_at: to_utc(command.id.created_at()),
            can_manage_channels: command
                .member
                .as_ref()
                .and_then(|m| m.permissions)
                .map(can_manage)
                .unwrap_or(false),
        };
        let reply = self
            .admin
            .dispatch(&invocation, spec, &slash_args(&command.data.options))
            .await;
        Self::send_interaction_reply(ctx, &command, &reply).await;
    }

    async fn send_interaction_reply(ctx: &Context, command: &CommandInteraction, reply: &str) {
        let mut chunks = split_content(reply, MAX_CONTENT_LEN).into_iter();
        let Some(first) = chunks.next() else {
            return;
        };

        if let Err(e) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(first))
            .await
        {
            error!("Failed to respond to /{}: {}", command.data.name, e);
            return;
        }
        for chunk in chunks {
            let followup = CreateInteractionResponseFollowup::new().content(chunk).ephemeral(true);
            if let Err(e) = command.create_followup(&ctx.http, followup).await {
                error!("Failed to send follow-up for /{}: {}", command.data.name, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_precedence() {
        assert_eq!(display_name(Some("Nick"), Some("Global"), "user"), "Nick");
        assert_eq!(display_name(None, Some("Global"), "user"), "Global");
        assert_eq!(display_name(None, None, "user"), "user");
        assert_eq!(display_name(Some(""), None, "user"), "user");
    }

    #[test]
    fn test_can_manage() {
        assert!(can_manage(Permissions::MANAGE_CHANNELS | Permissions::SEND_MESSAGES));
        assert!(can_manage(Permissions::ADMINISTRATOR));
        assert!(!can_manage(Permissions::SEND_MESSAGES));
    }
}
