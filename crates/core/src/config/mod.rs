//! Configuration for the liquidation bot.
//!
//! Two layers:
//! - Deployment values from the environment (RPC endpoint, key, contracts, terms)
//! - Runtime tunables from an optional TOML file (indexer, health policy, gas)

mod bot;
mod deployment;

pub use bot::{BotSettings, GasSettings, SETTINGS_ENV};
pub use deployment::DeploymentConfig;

use thiserror::Error;

/// Missing or malformed startup input. Always fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("invalid settings file {path}: {reason}")]
    Settings { path: String, reason: String },
}
