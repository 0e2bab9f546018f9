//! Liquidation executor.
//!
//! Turns an eligible account id into a signed `liquidateBorrow` submission.
//! Every check happens before anything is sent; a failure at any step leaves
//! the chain untouched.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use liqbot_chain::{ChainClient, ChainError, LiquidationIntent, TxReceipt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Collateral choice and repay amount for one liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationTerms {
    /// cToken market to seize from.
    pub collateral: Address,
    /// Amount repaid in the borrowed asset's base units.
    pub repay_amount: U256,
}

impl LiquidationTerms {
    fn validate(&self) -> Result<(), &'static str> {
        if self.collateral.is_zero() {
            return Err("collateral market is the zero address");
        }
        if self.repay_amount.is_zero() {
            return Err("repay amount is zero");
        }
        Ok(())
    }
}

/// Chooses the terms for liquidating a borrower.
pub trait TermsPolicy: Send + Sync {
    fn terms_for(&self, borrower: Address) -> LiquidationTerms;
}

/// Same collateral market and repay amount for every borrower.
#[derive(Debug, Clone)]
pub struct FixedTerms(pub LiquidationTerms);

impl TermsPolicy for FixedTerms {
    fn terms_for(&self, _borrower: Address) -> LiquidationTerms {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("borrower id {0:?} is not an address")]
    InvalidBorrower(String),

    #[error("invalid liquidation terms for {borrower}: {reason}")]
    InvalidTerms {
        borrower: Address,
        reason: &'static str,
    },

    #[error("gas pricing unavailable: {0}")]
    GasPricing(String),

    #[error("liquidation of {borrower} failed: {source}")]
    Submission {
        borrower: Address,
        #[source]
        source: ChainError,
    },

    #[error("liquidation cancelled")]
    Cancelled,
}

#[async_trait]
pub trait LiquidationExecutor: Send + Sync {
    async fn liquidate(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt, ExecutionError>;
}

/// Liquidates borrowers of one market through a [`ChainClient`].
pub struct Liquidator {
    chain: Arc<dyn ChainClient>,
    /// Borrowed market the repay goes to.
    market: Address,
    terms: Arc<dyn TermsPolicy>,
}

impl Liquidator {
    pub fn new(chain: Arc<dyn ChainClient>, market: Address, terms: Arc<dyn TermsPolicy>) -> Self {
        Self {
            chain,
            market,
            terms,
        }
    }
}

#[async_trait]
impl LiquidationExecutor for Liquidator {
    #[instrument(skip(self, cancel), fields(market = %self.market))]
    async fn liquidate(
        &self,
        borrower_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt, ExecutionError> {
        let start = Instant::now();

        let borrower: Address = borrower_id
            .trim()
            .parse()
            .map_err(|_| ExecutionError::InvalidBorrower(borrower_id.to_string()))?;

        let terms = self.terms.terms_for(borrower);
        terms
            .validate()
            .map_err(|reason| ExecutionError::InvalidTerms { borrower, reason })?;

        let gas = match self.chain.gas_params(cancel).await {
            Ok(gas) => gas,
            Err(ChainError::Cancelled) => return Err(ExecutionError::Cancelled),
            Err(e) => return Err(ExecutionError::GasPricing(e.to_string())),
        };
        if !gas.is_priced() {
            return Err(ExecutionError::GasPricing("node returned a zero gas price".to_string()));
        }

        debug!(
            borrower = %borrower,
            collateral = %terms.collateral,
            repay_amount = %terms.repay_amount,
            gas_price = gas.effective_gas_price(),
            "Liquidation intent ready"
        );

        let intent = LiquidationIntent {
            borrower,
            market: self.market,
            collateral: terms.collateral,
            repay_amount: terms.repay_amount,
            gas,
        };

        let receipt = match self.chain.submit(&intent, cancel).await {
            Ok(receipt) => receipt,
            Err(ChainError::Cancelled) => return Err(ExecutionError::Cancelled),
            Err(source) => return Err(ExecutionError::Submission { borrower, source }),
        };

        info!(
            borrower = %borrower,
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            elapsed_ms = start.elapsed().as_millis(),
            "Liquidation confirmed"
        );

        Ok(receipt)
    }
}
