//! Administrator command table and argument parsing.
//!
//! The table is the single source for both front ends: the prefix parser
//! reads option names and order from it, slash registration builds its
//! options from it and help text is generated from it.

use std::collections::BTreeMap;

use crate::common::error::{RelayError, RelayResult};
use crate::common::types::ChannelId;
use crate::links::{Category, CategoryPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Channel,
    Text,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageChannels,
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub permission: Option<Permission>,
    /// Commands only usable inside a guild.
    pub guild_only: bool,
    pub options: &'static [OptionSpec],
}

impl CommandSpec {
    /// Usage line, e.g. `set_link_filter <channel> <link_type> <enabled>`.
    pub fn usage(&self, prefix: &str) -> String {
        let mut usage = format!("{}{}", prefix, self.name);
        for option in self.options {
            if option.required {
                usage.push_str(&format!(" <{}>", option.name));
            } else if option.kind == OptionKind::Boolean {
                usage.push_str(&format!(" [{}=true]", option.name));
            } else {
                usage.push_str(&format!(" [{}]", option.name));
            }
        }
        usage
    }

    fn option(&self, name: &str) -> Option<&'static OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }
}

const fn flag(name: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        description,
        kind: OptionKind::Boolean,
        required: false,
    }
}

const CHANNEL_OPTION: OptionSpec = OptionSpec {
    name: "channel",
    description: "The output channel",
    kind: OptionKind::Channel,
    required: true,
};

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "add_link_channel",
        description: "Add or configure a channel to receive specific types of links.",
        permission: Some(Permission::ManageChannels),
        guild_only: true,
        options: &[
            CHANNEL_OPTION,
            flag("youtube", "Enable YouTube links"),
            flag("twitch", "Enable Twitch links"),
            flag("twitter", "Enable Twitter/X links"),
            flag("instagram", "Enable Instagram links"),
            flag("tiktok", "Enable TikTok links"),
            flag("reddit", "Enable Reddit links"),
            flag("github", "Enable GitHub links"),
            flag("discord_links", "Enable Discord invite links"),
            flag("other", "Enable all other links"),
        ],
    },
    CommandSpec {
        name: "remove_link_channel",
        description: "Remove a channel from receiving forwarded links.",
        permission: Some(Permission::ManageChannels),
        guild_only: true,
        options: &[CHANNEL_OPTION],
    },
    CommandSpec {
        name: "list_link_channels",
        description: "Show all channels set to receive forwarded links and their filters.",
        permission: None,
        guild_only: true,
        options: &[],
    },
    CommandSpec {
        name: "set_link_filter",
        description: "Enable or disable a specific link type for a channel.",
        permission: Some(Permission::ManageChannels),
        guild_only: true,
        options: &[
            CHANNEL_OPTION,
            OptionSpec {
                name: "link_type",
                description: "youtube, twitch, twitter, instagram, tiktok, reddit, github, discord or other",
                kind: OptionKind::Text,
                required: true,
            },
            OptionSpec {
                name: "enabled",
                description: "Whether links of this type are forwarded",
                kind: OptionKind::Boolean,
                required: true,
            },
        ],
    },
    CommandSpec {
        name: "quick_link_setup",
        description: "Create a channel that receives all link types in one step.",
        permission: Some(Permission::ManageChannels),
        guild_only: true,
        options: &[OptionSpec {
            name: "channel_name",
            description: "Name for the links channel",
            kind: OptionKind::Text,
            required: false,
        }],
    },
    CommandSpec {
        name: "ping",
        description: "Check bot latency.",
        permission: None,
        guild_only: false,
        options: &[],
    },
    CommandSpec {
        name: "support",
        description: "Get the link to the support server.",
        permission: None,
        guild_only: false,
        options: &[],
    },
    CommandSpec {
        name: "help",
        description: "Show this help message.",
        permission: None,
        guild_only: false,
        options: &[],
    },
];

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    let name = name.to_lowercase();
    COMMANDS.iter().find(|c| c.name == name)
}

/// Generated help text listing every command.
pub fn help_text(prefix: &str) -> String {
    let mut text = format!("**Link Monitor v{}**\n", env!("CARGO_PKG_VERSION"));
    text.push_str("Links posted in this server are moved to the configured output channels.\n\n");
    text.push_str("**Available Commands:**\n");
    for spec in COMMANDS {
        text.push_str(&format!("• `{}` - {}\n", spec.usage(prefix), spec.description));
    }
    text.trim_end().to_string()
}

/// A channel as given in a command: mention/id or a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(ChannelId),
    Name(String),
}

impl ChannelRef {
    pub fn parse(raw: &str) -> RelayResult<Self> {
        let raw = raw.trim();
        let id = raw
            .strip_prefix("<#")
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(raw);
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            return id
                .parse()
                .map(ChannelRef::Id)
                .map_err(|_| RelayError::validation(format!("Invalid channel id '{}'", raw)));
        }

        let name = raw.trim_start_matches('#');
        if name.is_empty() {
            return Err(RelayError::validation("Channel name cannot be empty!"));
        }
        Ok(ChannelRef::Name(name.to_string()))
    }
}

fn parse_bool(name: &str, raw: &str) -> RelayResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(RelayError::validation(format!(
            "Invalid value '{}' for {}, expected true or false",
            raw, name
        ))),
    }
}

/// Raw option values keyed by option name, as produced by a front end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: BTreeMap<String, String>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Parse prefix-style arguments against a command's options.
    ///
    /// `key=value` sets an option by name, a bare boolean option name sets it
    /// to true and anything else fills the next non-boolean option in order.
    pub fn from_prefix_args(spec: &CommandSpec, raw: &str) -> RelayResult<Self> {
        let mut args = CommandArgs::new();
        let mut positional = spec
            .options
            .iter()
            .filter(|o| o.kind != OptionKind::Boolean || o.required);

        for token in raw.split_whitespace() {
            if let Some((key, value)) = token.split_once('=') {
                let option = spec.option(&key.to_lowercase()).ok_or_else(|| {
                    RelayError::validation(format!("Unknown option '{}' for {}", key, spec.name))
                })?;
                args.insert(option.name, value);
                continue;
            }

            if let Some(option) = spec
                .option(&token.to_lowercase())
                .filter(|o| o.kind == OptionKind::Boolean && !o.required)
            {
                args.insert(option.name, "true");
                continue;
            }

            let option = positional
                .by_ref()
                .find(|o| args.get(o.name).is_none())
                .ok_or_else(|| {
                    RelayError::validation(format!(
                        "Unexpected argument '{}' for {}",
                        token, spec.name
                    ))
                })?;
            args.insert(option.name, token);
        }

        Ok(args)
    }

    fn require(&self, spec: &CommandSpec, name: &str) -> RelayResult<&str> {
        self.get(name).ok_or_else(|| {
            RelayError::validation(format!("Missing required option '{}' for {}", name, spec.name))
        })
    }

    fn flag(&self, name: &str) -> RelayResult<bool> {
        self.get(name).map_or(Ok(false), |raw| parse_bool(name, raw))
    }
}

/// A fully parsed administrator command.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    AddLinkChannel { channel: ChannelRef, patch: CategoryPatch },
    RemoveLinkChannel { channel: ChannelRef },
    ListLinkChannels,
    SetLinkFilter { channel: ChannelRef, category: Category, enabled: bool },
    QuickLinkSetup { channel_name: Option<String> },
    Ping,
    Support,
    Help,
}

impl AdminCommand {
    pub fn parse(spec: &CommandSpec, args: &CommandArgs) -> RelayResult<Self> {
        match spec.name {
            "add_link_channel" => {
                let channel = ChannelRef::parse(args.require(spec, "channel")?)?;
                // Every category is written so the command configures the whole set.
                let mut patch = CategoryPatch::new();
                for category in Category::ALL {
                    let name = match category {
                        Category::Discord => "discord_links",
                        other => other.as_str(),
                    };
                    patch.insert(category, args.flag(name)?);
                }
                Ok(Self::AddLinkChannel { channel, patch })
            }
            "remove_link_channel" => Ok(Self::RemoveLinkChannel {
                channel: ChannelRef::parse(args.require(spec, "channel")?)?,
            }),
            "list_link_channels" => Ok(Self::ListLinkChannels),
            "set_link_filter" => Ok(Self::SetLinkFilter {
                channel: ChannelRef::parse(args.require(spec, "channel")?)?,
                category: args.require(spec, "link_type")?.parse()?,
                enabled: parse_bool("enabled", args.require(spec, "enabled")?)?,
            }),
            "quick_link_setup" => Ok(Self::QuickLinkSetup {
                channel_name: args
                    .get("channel_name")
                    .map(|n| n.trim().trim_start_matches('#').to_string())
                    .filter(|n| !n.is_empty()),
            }),
            "ping" => Ok(Self::Ping),
            "support" => Ok(Self::Support),
            "help" => Ok(Self::Help),
            other => Err(RelayError::validation(format!("Unknown command '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn spec(name: &str) -> &'static CommandSpec {
        find_command(name).unwrap()
    }

    #[test]
    fn test_every_command_parses_by_name() {
        for command in COMMANDS {
            assert!(find_command(command.name).is_some());
        }
        assert!(find_command("ADD_LINK_CHANNEL").is_some());
        assert!(find_command("addoutput").is_none());
    }

    #[test]
    fn test_channel_ref_parse() {
        assert_eq!(ChannelRef::parse("<#123>").unwrap(), ChannelRef::Id(123));
        assert_eq!(ChannelRef::parse("456").unwrap(), ChannelRef::Id(456));
        assert_eq!(
            ChannelRef::parse("#links").unwrap(),
            ChannelRef::Name("links".to_string())
        );
        assert_err!(ChannelRef::parse("#"));
    }

    #[test]
    fn test_prefix_args_positional_and_flags() {
        let spec = spec("add_link_channel");
        let args =
            CommandArgs::from_prefix_args(spec, "<#10> youtube github=true other=false").unwrap();

        assert_eq!(args.get("channel"), Some("<#10>"));
        assert_eq!(args.get("youtube"), Some("true"));
        assert_eq!(args.get("github"), Some("true"));
        assert_eq!(args.get("other"), Some("false"));
    }

    #[test]
    fn test_prefix_args_reject_unknown() {
        let spec = spec("remove_link_channel");
        assert_err!(CommandArgs::from_prefix_args(spec, "#a #b"));
        assert_err!(CommandArgs::from_prefix_args(spec, "colour=red"));
    }

    #[test]
    fn test_prefix_args_required_boolean_is_positional() {
        let spec = spec("set_link_filter");
        let args = CommandArgs::from_prefix_args(spec, "#links youtube false").unwrap();
        assert_eq!(args.get("link_type"), Some("youtube"));
        assert_eq!(args.get("enabled"), Some("false"));
    }

    #[test]
    fn test_parse_add_link_channel_sets_every_category() {
        let args = CommandArgs::new()
            .with("channel", "10")
            .with("youtube", "true")
            .with("discord_links", "yes");
        let command = AdminCommand::parse(spec("add_link_channel"), &args).unwrap();

        let AdminCommand::AddLinkChannel { channel, patch } = command else {
            panic!("wrong command");
        };
        assert_eq!(channel, ChannelRef::Id(10));
        assert_eq!(patch.iter().count(), Category::ALL.len());
        let enabled: Vec<_> = patch.iter().filter(|(_, on)| *on).map(|(c, _)| *c).collect();
        assert_eq!(enabled, vec![Category::Youtube, Category::Discord]);
    }

    #[test]
    fn test_parse_missing_required_option() {
        let result = AdminCommand::parse(spec("remove_link_channel"), &CommandArgs::new());
        assert!(matches!(result, Err(RelayError::Validation { .. })));
    }

    #[test]
    fn test_parse_set_link_filter() {
        let args = CommandArgs::new()
            .with("channel", "#links")
            .with("link_type", "X")
            .with("enabled", "off");
        let command = assert_ok!(AdminCommand::parse(spec("set_link_filter"), &args));
        assert_eq!(
            command,
            AdminCommand::SetLinkFilter {
                channel: ChannelRef::Name("links".to_string()),
                category: Category::Twitter,
                enabled: false,
            }
        );
    }

    #[test]
    fn test_parse_set_link_filter_invalid_type() {
        let args = CommandArgs::new()
            .with("channel", "1")
            .with("link_type", "myspace")
            .with("enabled", "true");
        let error = AdminCommand::parse(spec("set_link_filter"), &args).unwrap_err();
        assert!(error.to_string().contains("Valid types"));
    }

    #[test]
    fn test_parse_invalid_bool() {
        let args = CommandArgs::new().with("channel", "1").with("youtube", "maybe");
        assert_err!(AdminCommand::parse(spec("add_link_channel"), &args));
    }

    #[test]
    fn test_quick_setup_default_name() {
        let command = AdminCommand::parse(spec("quick_link_setup"), &CommandArgs::new()).unwrap();
        assert_eq!(command, AdminCommand::QuickLinkSetup { channel_name: None });
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text("!");
        assert!(help.contains(env!("CARGO_PKG_VERSION")));
        for command in COMMANDS {
            assert!(help.contains(&format!("!{}", command.name)));
        }
        assert!(help.contains("!set_link_filter <channel> <link_type> <enabled>"));
    }
}
