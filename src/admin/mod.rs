//! Administrator commands shared by the prefix and slash front ends.

pub mod commands;
pub mod service;

pub use commands::{
    find_command, help_text, AdminCommand, ChannelRef, CommandArgs, CommandSpec, OptionKind,
    OptionSpec, Permission, COMMANDS,
};
pub use service::{AdminService, Invocation};
