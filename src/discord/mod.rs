//! Discord bot integration.
//!
//! Serenity client, gateway event handling, command front ends and the
//! REST/webhook implementation of the relay platform.

pub mod client;
pub mod commands;
pub mod handler;
pub mod platform;

pub use client::{DiscordBot, DiscordBotBuilder};
