//! Execution of administrator commands against the registry and platform.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::admin::commands::{
    help_text, AdminCommand, ChannelRef, CommandArgs, CommandSpec, Permission,
};
use crate::common::error::{RelayError, RelayResult};
use crate::common::types::{ChannelId, GuildId};
use crate::links::{Category, CategoryPatch};
use crate::registry::DestinationRegistry;
use crate::relay::platform::{SharedPlatform, TextChannel};

const CHANNEL_TOPIC: &str = "Configured to receive specific link types";

/// Who ran a command, and where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author_name: String,
    /// When the triggering message or interaction was created.
    pub sent_at: DateTime<Utc>,
    pub can_manage_channels: bool,
}

fn mention(channel_id: ChannelId) -> String {
    format!("<#{}>", channel_id)
}

fn channel_label(channel: &ChannelRef) -> String {
    match channel {
        ChannelRef::Id(id) => mention(*id),
        ChannelRef::Name(name) => format!("#{}", name),
    }
}

fn render_error(error: &RelayError) -> String {
    match error {
        RelayError::PermissionDenied { message } | RelayError::Validation { message } => {
            format!("❌ {}", message)
        }
        RelayError::NotFound { what } => format!("❌ Could not find {}.", what),
        RelayError::Transport { .. } => format!("❌ An error occurred: {}", error),
    }
}

#[derive(Clone)]
pub struct AdminService {
    registry: DestinationRegistry,
    platform: SharedPlatform,
    prefix: String,
    support_url: String,
    default_channel_name: String,
}

impl AdminService {
    pub fn new(
        registry: DestinationRegistry,
        platform: SharedPlatform,
        prefix: impl Into<String>,
        support_url: impl Into<String>,
        default_channel_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            platform,
            prefix: prefix.into(),
            support_url: support_url.into(),
            default_channel_name: default_channel_name.into(),
        }
    }

    /// Check access, parse and run a command. Always produces a reply.
    pub async fn dispatch(
        &self,
        invocation: &Invocation,
        spec: &CommandSpec,
        args: &CommandArgs,
    ) -> String {
        info!(
            "{} command from {} in guild {:?} channel {}",
            spec.name, invocation.author_name, invocation.guild_id, invocation.channel_id
        );

        if spec.guild_only && invocation.guild_id.is_none() {
            return "❌ This command can only be used in a server!".to_string();
        }
        if spec.permission == Some(Permission::ManageChannels) && !invocation.can_manage_channels {
            return "❌ You don't have permission to manage channels!".to_string();
        }

        let command = match AdminCommand::parse(spec, args) {
            Ok(command) => command,
            Err(e) => {
                return format!("{}\nUsage: `{}`", render_error(&e), spec.usage(&self.prefix));
            }
        };

        match self.execute(invocation, command).await {
            Ok(reply) => reply,
            Err(e) => {
                if !matches!(e, RelayError::Validation { .. }) {
                    error!("{} command failed: {}", spec.name, e);
                }
                render_error(&e)
            }
        }
    }

    /// Run a prefix command from its raw argument text.
    pub async fn dispatch_prefix(
        &self,
        invocation: &Invocation,
        spec: &CommandSpec,
        raw: &str,
    ) -> String {
        match CommandArgs::from_prefix_args(spec, raw) {
            Ok(args) => self.dispatch(invocation, spec, &args).await,
            Err(e) => format!("{}\nUsage: `{}`", render_error(&e), spec.usage(&self.prefix)),
        }
    }

    pub async fn execute(
        &self,
        invocation: &Invocation,
        command: AdminCommand,
    ) -> RelayResult<String> {
        match command {
            AdminCommand::Ping => Ok(self.ping(invocation)),
            AdminCommand::Support => Ok(format!("Join our support server: {}", self.support_url)),
            AdminCommand::Help => Ok(help_text(&self.prefix)),
            guild_command => {
                let guild_id = invocation.guild_id.ok_or_else(|| {
                    RelayError::validation("This command can only be used in a server!")
                })?;
                self.execute_in_guild(invocation, guild_id, guild_command).await
            }
        }
    }

    async fn execute_in_guild(
        &self,
        invocation: &Invocation,
        guild_id: GuildId,
        command: AdminCommand,
    ) -> RelayResult<String> {
        match command {
            AdminCommand::AddLinkChannel { channel, patch } => {
                self.add_link_channel(invocation, guild_id, channel, patch).await
            }
            AdminCommand::RemoveLinkChannel { channel } => {
                self.remove_link_channel(guild_id, channel).await
            }
            AdminCommand::ListLinkChannels => self.list_link_channels(guild_id).await,
            AdminCommand::SetLinkFilter {
                channel,
                category,
                enabled,
            } => self.set_link_filter(guild_id, channel, category, enabled).await,
            AdminCommand::QuickLinkSetup { channel_name } => {
                let name = channel_name.unwrap_or_else(|| self.default_channel_name.clone());
                self.quick_link_setup(invocation, guild_id, &name).await
            }
            AdminCommand::Ping | AdminCommand::Support | AdminCommand::Help => {
                Err(RelayError::validation("Not a server command"))
            }
        }
    }

    fn ping(&self, invocation: &Invocation) -> String {
        let latency = (Utc::now() - invocation.sent_at).num_milliseconds().max(0);
        format!("🏓 Pong! Latency: {}ms", latency)
    }

    /// Find a text channel by exact name or create it.
    async fn get_or_create_channel(
        &self,
        invocation: &Invocation,
        guild_id: GuildId,
        name: &str,
    ) -> RelayResult<TextChannel> {
        if let Some(existing) = self.platform.find_text_channel_by_name(guild_id, name).await? {
            return Ok(existing);
        }

        let reason = format!("Created by {} via bot command", invocation.author_name);
        match self
            .platform
            .create_text_channel(guild_id, name, CHANNEL_TOPIC, &reason)
            .await
        {
            Ok(channel) => {
                info!("Created channel #{} in guild {}", channel.name, guild_id);
                Ok(channel)
            }
            Err(e) if e.is_permission_denied() => {
                warn!("Missing permission to create channels in guild {}", guild_id);
                Err(RelayError::permission("I don't have permission to create channels!"))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a channel reference to an existing channel of this guild.
    async fn existing_channel(
        &self,
        guild_id: GuildId,
        channel: &ChannelRef,
    ) -> RelayResult<Option<ChannelId>> {
        match channel {
            ChannelRef::Id(id) => Ok(Some(*id)),
            ChannelRef::Name(name) => Ok(self
                .platform
                .find_text_channel_by_name(guild_id, name)
                .await?
                .map(|c| c.id)),
        }
    }

    async fn add_link_channel(
        &self,
        invocation: &Invocation,
        guild_id: GuildId,
        channel: ChannelRef,
        patch: CategoryPatch,
    ) -> RelayResult<String> {
        if !patch.enables_any() {
            return Err(RelayError::validation("You must enable at least one link type!"));
        }

        let channel_id = match channel {
            ChannelRef::Id(id) => self
                .platform
                .text_channel(guild_id, id)
                .await?
                .ok_or_else(|| RelayError::validation("Channel not found or not a text channel!"))?
                .id,
            ChannelRef::Name(name) => {
                self.get_or_create_channel(invocation, guild_id, &name)
                    .await?
                    .id
            }
        };

        let destination = self.registry.upsert(guild_id, channel_id, &patch).await?;
        let enabled: Vec<String> = destination
            .flags
            .enabled()
            .map(|c| format!("• {}", c.label()))
            .collect();

        info!(
            "Configured output channel {} in guild {} with {} link type(s)",
            channel_id,
            guild_id,
            enabled.len()
        );
        Ok(format!(
            "✅ Output Channel Configured\n{} will now receive:\n{}",
            mention(channel_id),
            enabled.join("\n")
        ))
    }

    async fn remove_link_channel(
        &self,
        guild_id: GuildId,
        channel: ChannelRef,
    ) -> RelayResult<String> {
        let label = channel_label(&channel);
        let removed = match self.existing_channel(guild_id, &channel).await? {
            Some(channel_id) => self.registry.remove(guild_id, channel_id).await?,
            None => false,
        };

        if removed {
            Ok(format!(
                "✅ Output Channel Removed\n{} will no longer receive links.",
                label
            ))
        } else {
            warn!(
                "Could not remove output channel {} in guild {}: not configured",
                label, guild_id
            );
            Ok(format!("❌ {} is not configured as an output channel.", label))
        }
    }

    async fn list_link_channels(&self, guild_id: GuildId) -> RelayResult<String> {
        let destinations = self.registry.list_for_guild(guild_id, None).await?;
        if destinations.is_empty() {
            return Ok(format!(
                "❌ No output channels configured. Use `{}add_link_channel` to add one.",
                self.prefix
            ));
        }

        let mut response = String::from(
            "📤 Output Channels\nConfigured output channels and their link type filters:\n",
        );
        for destination in destinations {
            let channel = match self.platform.text_channel(guild_id, destination.channel_id).await {
                Ok(Some(channel)) => channel,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Could not look up channel {}: {}", destination.channel_id, e);
                    continue;
                }
            };

            let enabled: Vec<&str> = destination.flags.enabled().map(|c| c.label()).collect();
            let enabled = if enabled.is_empty() {
                "None".to_string()
            } else {
                enabled.join(", ")
            };
            response.push_str(&format!("\n#{}: {}", channel.name, enabled));
        }

        Ok(response)
    }

    async fn set_link_filter(
        &self,
        guild_id: GuildId,
        channel: ChannelRef,
        category: Category,
        enabled: bool,
    ) -> RelayResult<String> {
        let not_configured = |label: String| {
            format!(
                "❌ {} is not configured as an output channel. Use `{}add_link_channel` first.",
                label, self.prefix
            )
        };

        let Some(channel_id) = self.existing_channel(guild_id, &channel).await? else {
            return Ok(not_configured(channel_label(&channel)));
        };

        match self
            .registry
            .set_category(guild_id, channel_id, category, enabled)
            .await
        {
            Ok(_) => {
                let status = if enabled { "enabled" } else { "disabled" };
                Ok(format!(
                    "✅ Filter Updated\n{} links are now {} for {}",
                    category.label(),
                    status,
                    mention(channel_id)
                ))
            }
            Err(e) if e.is_not_found() => Ok(not_configured(mention(channel_id))),
            Err(e) => Err(e),
        }
    }

    async fn quick_link_setup(
        &self,
        invocation: &Invocation,
        guild_id: GuildId,
        name: &str,
    ) -> RelayResult<String> {
        let channel = self.get_or_create_channel(invocation, guild_id, name).await?;
        self.registry
            .upsert(guild_id, channel.id, &CategoryPatch::all_enabled())
            .await?;
        info!("Quick setup configured #{} in guild {}", channel.name, guild_id);

        let welcome = "**🔗 Links Channel Ready!**\n\
            All links shared in this server will be posted here automatically.";
        if let Err(e) = self.platform.send_message(channel.id, welcome).await {
            warn!("Could not post welcome message in #{}: {}", channel.name, e);
        }

        Ok(format!(
            "✅ Quick Setup Complete!\n{} is now configured to receive all link types!\n\n\
             All links posted in this server will be forwarded to this channel.\n\n\
             Use `{p}list_link_channels` to see the configuration.\n\
             Use `{p}set_link_filter` to modify link type filters.",
            mention(channel.id),
            p = self.prefix
        ))
    }
}
