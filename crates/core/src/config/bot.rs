//! Runtime tunables loaded from an optional TOML file.

use super::ConfigError;
use crate::evaluator::HealthPolicy;
use liqbot_api::{COMPOUND_V2_SUBGRAPH, DEFAULT_PAGE_SIZE};
use liqbot_chain::{GasPricingModel, DEFAULT_RECEIPT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "LIQBOT_SETTINGS";

/// Runtime tunables. Every field has a default, so an absent file or an empty
/// table is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotSettings {
    /// GraphQL endpoint of the account indexer
    #[serde(default = "default_subgraph_url")]
    pub subgraph_url: String,

    /// Accounts requested per scan
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on health for eligibility; unset disables the check
    #[serde(default)]
    pub max_health: Option<f64>,

    #[serde(default)]
    pub gas: GasSettings,

    /// Fixed gas limit; unset means estimate per transaction
    #[serde(default)]
    pub gas_limit: Option<u64>,

    /// Seconds to wait for a liquidation receipt before reporting the outcome as unknown
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,

    /// Log a snapshot of reference prices at startup
    #[serde(default)]
    pub price_check: bool,
}

fn default_subgraph_url() -> String {
    COMPOUND_V2_SUBGRAPH.to_string()
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_receipt_timeout() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT.as_secs()
}

/// Gas pricing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasSettings {
    /// `legacy` or `eip1559`
    #[serde(default = "default_pricing")]
    pub pricing: String,

    /// Cap on gas price (legacy) or max fee per gas (EIP-1559)
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: f64,

    /// Cap on the priority fee
    #[serde(default = "default_priority_fee")]
    pub priority_fee_gwei: f64,

    /// max_fee = base_fee * multiplier + priority_fee
    #[serde(default = "default_max_fee_multiplier")]
    pub max_fee_multiplier: f64,
}

fn default_pricing() -> String {
    "legacy".to_string()
}
fn default_max_gas_price() -> f64 {
    500.0
}
fn default_priority_fee() -> f64 {
    2.0
}
fn default_max_fee_multiplier() -> f64 {
    2.0
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            pricing: default_pricing(),
            max_gas_price_gwei: default_max_gas_price(),
            priority_fee_gwei: default_priority_fee(),
            max_fee_multiplier: default_max_fee_multiplier(),
        }
    }
}

impl GasSettings {
    pub fn pricing_model(&self) -> Result<GasPricingModel, String> {
        self.pricing.parse()
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            subgraph_url: default_subgraph_url(),
            page_size: default_page_size(),
            max_health: None,
            gas: GasSettings::default(),
            gas_limit: None,
            receipt_timeout_secs: default_receipt_timeout(),
            price_check: false,
        }
    }
}

impl BotSettings {
    /// Load and validate settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings_error = |reason: String| ConfigError::Settings {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
        let settings: Self = toml::from_str(&content).map_err(|e| settings_error(e.to_string()))?;
        settings.validate().map_err(settings_error)?;
        Ok(settings)
    }

    /// Load from the file named by `LIQBOT_SETTINGS`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(SETTINGS_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.subgraph_url)
            .map_err(|e| format!("subgraph_url {:?}: {e}", self.subgraph_url))?;

        if self.page_size == 0 {
            return Err("page_size must be at least 1".to_string());
        }
        if let Some(max) = self.max_health {
            if !max.is_finite() || max <= 0.0 {
                return Err(format!("max_health must be a positive number, got {max}"));
            }
        }
        if self.gas_limit == Some(0) {
            return Err("gas_limit must be greater than zero".to_string());
        }
        if self.receipt_timeout_secs == 0 {
            return Err("receipt_timeout_secs must be greater than zero".to_string());
        }

        self.gas.pricing_model()?;
        for (name, value) in [
            ("gas.max_gas_price_gwei", self.gas.max_gas_price_gwei),
            ("gas.priority_fee_gwei", self.gas.priority_fee_gwei),
            ("gas.max_fee_multiplier", self.gas.max_fee_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be a positive number, got {value}"));
            }
        }
        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            max_health: self.max_health,
        }
    }

    /// Log the effective settings.
    pub fn log_settings(&self) {
        tracing::info!(
            subgraph_url = %self.subgraph_url,
            page_size = self.page_size,
            max_health = ?self.max_health,
            price_check = self.price_check,
            "Bot settings loaded"
        );
        tracing::info!(
            pricing = %self.gas.pricing,
            max_gas_price_gwei = self.gas.max_gas_price_gwei,
            priority_fee_gwei = self.gas.priority_fee_gwei,
            max_fee_multiplier = self.gas.max_fee_multiplier,
            gas_limit = ?self.gas_limit,
            receipt_timeout_secs = self.receipt_timeout_secs,
            "Gas settings"
        );
    }
}
