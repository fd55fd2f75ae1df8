//! `LINKRELAY_*` environment variables layered over the config file:
//! - `LINKRELAY_CONFIG` - config file path
//! - `LINKRELAY_DISCORD_TOKEN` - Discord bot token
//! - `LINKRELAY_STORE_BACKEND` - storage backend ("file" or "memory")
//! - `LINKRELAY_STORE_PATH` - storage file path

use std::env;

use crate::config::types::Config;

const ENV_PREFIX: &str = "LINKRELAY";

fn var_name(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

/// Overlay the process environment onto `config`.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, |name| env::var(name).ok())
}

/// Apply overrides read through `lookup`.
pub fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(token) = lookup(&var_name("DISCORD_TOKEN")) {
        config.discord.token = token;
    }
    if let Some(backend) = lookup(&var_name("STORE_BACKEND")) {
        config.storage.backend = backend;
    }
    if let Some(path) = lookup(&var_name("STORE_PATH")) {
        config.storage.path = path;
    }
    config
}

/// True if a token is supplied through the environment.
pub fn has_env_token() -> bool {
    env::var(var_name("DISCORD_TOKEN"))
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

/// Config file path: `LINKRELAY_CONFIG`, else `linkrelay.conf`.
pub fn get_config_path() -> String {
    env::var(var_name("CONFIG")).unwrap_or_else(|_| "linkrelay.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_variable_names() {
        assert_eq!(var_name("DISCORD_TOKEN"), "LINKRELAY_DISCORD_TOKEN");
    }

    #[test]
    fn test_overrides_applied() {
        let vars: HashMap<&str, &str> = [
            ("LINKRELAY_DISCORD_TOKEN", "from-env"),
            ("LINKRELAY_STORE_BACKEND", "memory"),
            ("LINKRELAY_STORE_PATH", "/var/lib/linkrelay.json"),
        ]
        .into_iter()
        .collect();

        let config =
            apply_overrides(Config::default(), |name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.discord.token, "from-env");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.path, "/var/lib/linkrelay.json");
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = Config::default();
        config.discord.token = "from-file".to_string();

        let result = apply_overrides(config, |_| None);
        assert_eq!(result.discord.token, "from-file");
        assert_eq!(result.storage.backend, "file");
    }
}
