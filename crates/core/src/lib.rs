//! Liquidation bot core logic.
//!
//! This crate provides:
//! - Configuration (environment deployment values + TOML tunables)
//! - Health evaluation of indexer accounts
//! - Liquidation execution through a chain client
//! - The monitor loop tying scan, evaluation and dispatch together

pub mod config;
mod evaluator;
mod executor;
mod monitor;

pub use config::{BotSettings, ConfigError, DeploymentConfig, GasSettings};
pub use evaluator::{evaluate, AccountMetrics, Decision, EvaluationError, HealthPolicy};
pub use executor::{
    ExecutionError, FixedTerms, LiquidationExecutor, LiquidationTerms, Liquidator, TermsPolicy,
};
pub use monitor::{verify_connectivity, CycleReport, Monitor, MonitorState};
