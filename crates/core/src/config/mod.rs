//! Configuration loading and validation.

mod loader;
mod types;
mod validate;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    AuthConfig, AuthMethod, Config, DatabaseConfig, SanitizedConfig, ServerConfig, SyncConfig,
};
pub use validate::validate_config;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
