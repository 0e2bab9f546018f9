//! Gas pricing strategies.
//!
//! A [`GasStrategy`] turns current network conditions into a [`GasParams`]
//! directive that is attached to each liquidation transaction. Both
//! strategies query the node on every call and cap the result; neither falls
//! back to a hardcoded price.
//!
//! # Example
//!
//! ```rust,ignore
//! use liqbot_chain::gas::{create_gas_strategy, GasPricingModel};
//!
//! // Pre-London chains and forks without a base fee
//! let legacy = create_gas_strategy(GasPricingModel::Legacy, 500.0, 2.0, 2.0);
//!
//! // Ethereum mainnet
//! let eip1559 = create_gas_strategy(GasPricingModel::Eip1559, 500.0, 2.0, 2.0);
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use alloy::providers::DynProvider;
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::str::FromStr;

const GWEI: f64 = 1e9;

/// Gas price directive for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasParams {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Base fee the directive was computed from.
        base_fee: u128,
    },
}

impl GasParams {
    /// Upper bound on the price paid per unit of gas.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// A directive with a zero price cannot be mined and is rejected before submission.
    pub fn is_priced(&self) -> bool {
        self.effective_gas_price() > 0
    }
}

/// Pluggable gas pricing policy.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Query current network conditions and build a directive.
    async fn fetch_params(&self, provider: &DynProvider) -> Result<GasParams>;

    /// Write the directive's fields into a transaction request.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    /// Strategy name for logging.
    fn strategy_name(&self) -> &'static str;
}

/// Supported gas pricing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPricingModel {
    Legacy,
    Eip1559,
}

impl FromStr for GasPricingModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(GasPricingModel::Legacy),
            "eip1559" | "eip-1559" => Ok(GasPricingModel::Eip1559),
            other => Err(format!("unknown gas pricing model {other:?} (expected legacy or eip1559)")),
        }
    }
}

fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * GWEI) as u128
}

/// Create a gas strategy from configured values.
///
/// # Arguments
/// * `model` - Pricing model
/// * `max_gas_price_gwei` - Cap on gas price / max fee per gas
/// * `priority_fee_cap_gwei` - Cap on the priority fee (EIP-1559 only)
/// * `max_fee_multiplier` - Base fee multiplier for max fee (EIP-1559 only)
pub fn create_gas_strategy(
    model: GasPricingModel,
    max_gas_price_gwei: f64,
    priority_fee_cap_gwei: f64,
    max_fee_multiplier: f64,
) -> Box<dyn GasStrategy> {
    match model {
        GasPricingModel::Eip1559 => Box::new(
            Eip1559GasStrategy::new(gwei_to_wei(priority_fee_cap_gwei), max_fee_multiplier)
                .with_max_fee_cap(gwei_to_wei(max_gas_price_gwei)),
        ),
        GasPricingModel::Legacy => Box::new(LegacyGasStrategy::new(gwei_to_wei(max_gas_price_gwei))),
    }
}
