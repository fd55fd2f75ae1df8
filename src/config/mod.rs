//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use std::path::Path;

use tracing::info;

use crate::common::error::ConfigError;

pub use parser::load_config;
pub use types::*;

/// Load the config file, apply environment overrides and validate.
///
/// A missing config file is fine when the token comes from the environment.
pub fn load_and_validate() -> Result<Config, ConfigError> {
    let path = env::get_config_path();

    let config = if Path::new(&path).exists() {
        info!("Loading config from: {}", path);
        load_config(&path)?
    } else if env::has_env_token() {
        info!("Config file {} not found, using defaults and environment", path);
        Config::default()
    } else {
        return Err(ConfigError::IoError {
            path,
            message: "file not found and LINKRELAY_DISCORD_TOKEN is not set".to_string(),
        });
    };

    let config = env::apply_env_overrides(config);
    validate::validate_config(&config)?;
    Ok(config)
}
