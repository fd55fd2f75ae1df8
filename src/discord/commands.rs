//! Discord front ends for the admin command table.
//!
//! Prefix commands (`!name args`) are parsed from message content. Slash
//! commands are registered from the same table and their options are
//! flattened into [`CommandArgs`].

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{CommandDataOption, CommandDataOptionValue, CommandOptionType};
use serenity::model::channel::ChannelType;
use serenity::model::permissions::Permissions;
use tracing::debug;

use crate::admin::{find_command, CommandArgs, CommandSpec, OptionKind, Permission, COMMANDS};

/// Commands longer than this are treated as ordinary messages.
const MAX_COMMAND_LEN: usize = 500;

/// Recognise a prefix command. Returns the command and its raw argument text.
pub fn parse_prefix_command<'a>(
    content: &'a str,
    prefix: &str,
) -> Option<(&'static CommandSpec, &'a str)> {
    if content.len() > MAX_COMMAND_LEN {
        return None;
    }
    let rest = content.trim().strip_prefix(prefix)?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let spec = find_command(name)?;
    debug!("Processing command: {} with args: {:?}", spec.name, args);
    Some((spec, args))
}

/// Flatten slash command options into [`CommandArgs`].
pub fn slash_args(options: &[CommandDataOption]) -> CommandArgs {
    let mut args = CommandArgs::new();
    for option in options {
        let value = match &option.value {
            CommandDataOptionValue::Boolean(b) => b.to_string(),
            CommandDataOptionValue::String(s) => s.clone(),
            CommandDataOptionValue::Channel(id) => id.get().to_string(),
            CommandDataOptionValue::Integer(i) => i.to_string(),
            other => {
                debug!("Ignoring unsupported option {}: {:?}", option.name, other);
                continue;
            }
        };
        args.insert(&option.name, value);
    }
    args
}

fn slash_command(spec: &CommandSpec) -> CreateCommand {
    let mut command = CreateCommand::new(spec.name)
        .description(spec.description)
        .dm_permission(!spec.guild_only);

    if spec.permission == Some(Permission::ManageChannels) {
        command = command.default_member_permissions(Permissions::MANAGE_CHANNELS);
    }

    for option in spec.options {
        let kind = match option.kind {
            OptionKind::Channel => CommandOptionType::Channel,
            OptionKind::Text => CommandOptionType::String,
            OptionKind::Boolean => CommandOptionType::Boolean,
        };
        let mut built = CreateCommandOption::new(kind, option.name, option.description)
            .required(option.required);
        if option.kind == OptionKind::Channel {
            built = built.channel_types(vec![ChannelType::Text, ChannelType::News]);
        }
        command = command.add_option(built);
    }

    command
}

/// Slash command definitions for every entry of the command table.
pub fn slash_commands() -> Vec<CreateCommand> {
    COMMANDS.iter().map(slash_command).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix_command() {
        let (spec, args) =
            parse_prefix_command("!set_link_filter #links youtube false", "!").unwrap();
        assert_eq!(spec.name, "set_link_filter");
        assert_eq!(args, "#links youtube false");

        let (spec, args) = parse_prefix_command("!PING", "!").unwrap();
        assert_eq!(spec.name, "ping");
        assert_eq!(args, "");
    }

    #[test]
    fn test_non_commands_are_not_parsed() {
        assert!(parse_prefix_command("hello https://example.com", "!").is_none());
        assert!(parse_prefix_command("!unknown https://example.com", "!").is_none());
        assert!(parse_prefix_command("?ping", "!").is_none());
    }

    #[test]
    fn test_custom_prefix() {
        assert!(parse_prefix_command("lr!help", "lr!").is_some());
    }

    #[test]
    fn test_prefix_args_round_trip_through_table() {
        let (spec, raw) = parse_prefix_command("!add_link_channel <#10> youtube", "!").unwrap();
        let args = CommandArgs::from_prefix_args(spec, raw).unwrap();
        assert_eq!(args.get("channel"), Some("<#10>"));
        assert_eq!(args.get("youtube"), Some("true"));
    }

    #[test]
    fn test_slash_commands_cover_table() {
        assert_eq!(slash_commands().len(), COMMANDS.len());
    }
}
