//! Persisted per-guild configuration.

pub mod destination;
pub mod settings;

pub use destination::{Destination, DestinationRegistry};
pub use settings::{migrate_legacy, GuildSettings, GuildSettingsStore};
