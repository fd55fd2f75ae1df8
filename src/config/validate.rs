//! Startup checks on the loaded configuration.
//!
//! Every problem is reported at once so a misconfigured deployment can be
//! fixed in one pass.

use crate::common::error::ConfigError;
use crate::config::types::{Config, StorageBackend};

const TOKEN_PLACEHOLDER: &str = "YOUR_DISCORD_TOKEN_HERE";

fn discord_problems(config: &Config, problems: &mut Vec<String>) {
    let token = config.discord.token.trim();
    if token.is_empty() {
        problems.push("discord.token is missing".to_string());
    } else if token == TOKEN_PLACEHOLDER {
        problems.push("discord.token still holds the placeholder value".to_string());
    }
    if config.discord.command_prefix.trim().is_empty() {
        problems.push("discord.command_prefix must not be empty".to_string());
    }
}

fn storage_problems(config: &Config, problems: &mut Vec<String>) {
    match config.storage.backend_kind() {
        Some(StorageBackend::File) if config.storage.path.trim().is_empty() => {
            problems.push("storage.path is required for the file backend".to_string());
        }
        Some(_) => {}
        None => problems.push(format!(
            "storage.backend '{}' is not one of: file, memory",
            config.storage.backend
        )),
    }
}

fn relay_problems(config: &Config, problems: &mut Vec<String>) {
    if config.relay.call_timeout_secs == 0 {
        problems.push("relay.call_timeout_secs must be at least 1".to_string());
    }
    if config.relay.webhook_name.trim().is_empty() {
        problems.push("relay.webhook_name must not be empty".to_string());
    }
    if config.relay.default_channel_name.trim().is_empty() {
        problems.push("relay.default_channel_name must not be empty".to_string());
    }
}

/// Check a configuration, collecting every problem into one error.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut problems = Vec::new();
    discord_problems(config, &mut problems);
    storage_problems(config, &mut problems);
    relay_problems(config, &mut problems);

    if problems.is_empty() {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        message: problems.join("; "),
    })
}
