//! Legacy gas pricing strategy (pre-EIP-1559).

use super::{GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Legacy gas pricing strategy.
///
/// Uses the node's `eth_gasPrice` suggestion, capped at `max_gas_price`.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Maximum gas price in wei.
    max_gas_price: u128,
}

impl LegacyGasStrategy {
    /// Create a new Legacy gas strategy with a cap in wei.
    pub fn new(max_gas_price: u128) -> Self {
        Self { max_gas_price }
    }

    fn capped(&self, gas_price: u128) -> u128 {
        gas_price.min(self.max_gas_price)
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self, provider: &DynProvider) -> Result<GasParams> {
        let suggested = provider.get_gas_price().await?;
        let gas_price = self.capped(suggested);

        debug!(suggested = suggested, gas_price = gas_price, "Legacy gas price");

        Ok(GasParams::Legacy { gas_price })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Legacy { gas_price } => {
                tx.set_gas_price(*gas_price);
            }
            GasParams::Eip1559 { max_fee_per_gas, .. } => {
                // Fallback: use max_fee as legacy gas price
                tx.set_gas_price(*max_fee_per_gas);
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn test_legacy_cap() {
        let strategy = LegacyGasStrategy::new(10_000_000_000);
        assert_eq!(strategy.capped(5_000_000_000), 5_000_000_000);
        assert_eq!(strategy.capped(20_000_000_000), 10_000_000_000);
    }

    #[test]
    fn test_legacy_apply_gas() {
        let strategy = LegacyGasStrategy::new(10_000_000_000);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        let params = GasParams::Legacy {
            gas_price: 5_000_000_000,
        };

        strategy.apply_gas(&mut tx, &params);
        assert_eq!(tx.gas_price, Some(5_000_000_000));
    }
}
