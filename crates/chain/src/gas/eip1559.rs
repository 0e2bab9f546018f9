//! EIP-1559 gas pricing strategy.

use super::{GasParams, GasStrategy};
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// EIP-1559 gas pricing strategy.
///
/// max_fee = base_fee * multiplier + priority_fee, capped at `max_fee_cap`.
/// The priority fee is the node's suggestion, capped at `priority_fee_cap`.
#[derive(Debug)]
pub struct Eip1559GasStrategy {
    /// Maximum priority fee (tip) in wei.
    priority_fee_cap: u128,
    /// Multiplier for max_fee relative to base_fee (e.g., 2.0 survives one full block of base fee growth).
    max_fee_multiplier: f64,
    /// Maximum allowed max_fee_per_gas in wei.
    max_fee_cap: u128,
}

impl Eip1559GasStrategy {
    /// Create a new EIP-1559 gas strategy.
    ///
    /// # Arguments
    /// * `priority_fee_cap` - Maximum priority fee (tip) in wei
    /// * `max_fee_multiplier` - Multiplier for max_fee (e.g., 2.0 means max_fee = 2 * base_fee + priority)
    pub fn new(priority_fee_cap: u128, max_fee_multiplier: f64) -> Self {
        Self {
            priority_fee_cap,
            max_fee_multiplier,
            max_fee_cap: 500_000_000_000, // 500 gwei
        }
    }

    /// Create with a custom max fee cap.
    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = cap;
        self
    }

    /// Calculate max_fee_per_gas based on base_fee.
    fn calculate_max_fee(&self, base_fee: u128, priority_fee: u128) -> u128 {
        let max_fee = ((base_fee as f64) * self.max_fee_multiplier) as u128 + priority_fee;
        max_fee.min(self.max_fee_cap)
    }

    fn build_params(&self, base_fee: u128, suggested_priority_fee: u128) -> GasParams {
        let priority_fee = suggested_priority_fee.min(self.priority_fee_cap);
        let max_fee_per_gas = self.calculate_max_fee(base_fee, priority_fee);

        GasParams::Eip1559 {
            max_fee_per_gas,
            // The tip can never exceed the total fee.
            max_priority_fee_per_gas: priority_fee.min(max_fee_per_gas),
            base_fee,
        }
    }
}

#[async_trait]
impl GasStrategy for Eip1559GasStrategy {
    async fn fetch_params(&self, provider: &DynProvider) -> Result<GasParams> {
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to get latest block"))?;

        let base_fee = block
            .header
            .base_fee_per_gas
            .map(|b| b as u128)
            .ok_or_else(|| anyhow::anyhow!("Latest block has no base fee, use legacy pricing"))?;

        let suggested_priority_fee = provider.get_max_priority_fee_per_gas().await?;

        let params = self.build_params(base_fee, suggested_priority_fee);
        debug!(
            base_fee = base_fee,
            suggested_priority_fee = suggested_priority_fee,
            max_fee = params.effective_gas_price(),
            "EIP-1559 gas params"
        );

        Ok(params)
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
            GasParams::Legacy { gas_price } => {
                // Fallback: treat gas_price as both max_fee and priority_fee
                tx.set_max_fee_per_gas(*gas_price);
                tx.set_max_priority_fee_per_gas(self.priority_fee_cap.min(*gas_price));
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}
