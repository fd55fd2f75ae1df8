//! Shared types used across the application.

/// Discord guild snowflake.
pub type GuildId = u64;

/// Discord channel snowflake. Destinations are identified by their channel.
pub type ChannelId = u64;

/// Discord message snowflake.
pub type MessageId = u64;

/// Identity a relayed message is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Name shown on the relayed message.
    pub display_name: String,
    /// Avatar shown on the relayed message.
    pub avatar_url: String,
}

/// A guild message as seen by the relay pipeline.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author: Author,
    pub content: String,
}
