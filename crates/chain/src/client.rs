//! Signing chain client.
//!
//! [`ChainClient`] is the seam between the liquidation logic and the node:
//! reads of Unitroller fields, gas directives, and submission of a
//! `liquidateBorrow` transaction through to its receipt.

use crate::contracts::{encode_liquidate_borrow, ComptrollerField, IComptroller};
use crate::gas::{GasParams, GasStrategy};
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{
    DynProvider, PendingTransactionError, Provider, ProviderBuilder, WatchTxError,
};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::{LocalSignerError, PrivateKeySigner};
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Errors from the chain client.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid private key: {0}")]
    InvalidKey(#[from] LocalSignerError),

    #[error("failed to read {field} from {contract}: {source}")]
    Read {
        contract: Address,
        field: ComptrollerField,
        #[source]
        source: alloy::contract::Error,
    },

    #[error("gas pricing failed: {0:#}")]
    Gas(anyhow::Error),

    #[error("transaction submission failed: {0}")]
    Send(#[from] TransportError),

    #[error("waiting for receipt failed: {0}")]
    Receipt(#[from] PendingTransactionError),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    /// Broadcast, but no receipt was observed; the transaction may still be mined.
    #[error("transaction {tx_hash} outcome unknown: {reason}")]
    Unconfirmed { tx_hash: B256, reason: String },

    #[error("cancelled")]
    Cancelled,
}

/// Everything needed to submit one `liquidateBorrow` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationIntent {
    /// Account whose debt is repaid.
    pub borrower: Address,
    /// Borrowed market; the transaction is sent here.
    pub market: Address,
    /// Collateral market to seize from.
    pub collateral: Address,
    /// Amount repaid in the borrowed asset's base units.
    pub repay_amount: U256,
    /// Gas directive.
    pub gas: GasParams,
}

/// Outcome of a mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read an address-valued Unitroller field.
    async fn read_field(
        &self,
        contract: Address,
        field: ComptrollerField,
        cancel: &CancellationToken,
    ) -> Result<Address, ChainError>;

    /// Current gas directive from the configured strategy.
    async fn gas_params(&self, cancel: &CancellationToken) -> Result<GasParams, ChainError>;

    /// Sign and send a liquidation, then wait for it to be mined.
    async fn submit(
        &self,
        intent: &LiquidationIntent,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt, ChainError>;
}

/// How long to wait for a receipt when nothing else is configured.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// JSON-RPC backed [`ChainClient`] with a local signing key.
///
/// Nonce and chain id come from the provider's fillers. The gas limit is
/// estimated unless one is configured. The receipt wait is bounded by
/// `receipt_timeout` and by the caller's cancellation token.
pub struct RpcChainClient {
    provider: DynProvider,
    address: Address,
    gas_strategy: Box<dyn GasStrategy>,
    gas_limit: Option<u64>,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    pub fn connect(rpc_url: Url, signer: PrivateKeySigner, gas_strategy: Box<dyn GasStrategy>) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(rpc_url)
            .erased();

        info!(
            address = %address,
            gas_strategy = gas_strategy.strategy_name(),
            "Chain client initialized"
        );

        Self {
            provider,
            address,
            gas_strategy,
            gas_limit: None,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    /// Give up waiting for a receipt after `timeout`.
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Use a fixed gas limit instead of estimating.
    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Address transactions are signed from.
    pub fn address(&self) -> Address {
        self.address
    }

    fn liquidation_request(&self, intent: &LiquidationIntent) -> TransactionRequest {
        let calldata = encode_liquidate_borrow(intent.borrower, intent.repay_amount, intent.collateral);
        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(intent.market)
            .with_input(calldata);

        if let Some(limit) = self.gas_limit {
            tx.set_gas_limit(limit);
        }
        self.gas_strategy.apply_gas(&mut tx, &intent.gas);
        tx
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn read_field(
        &self,
        contract: Address,
        field: ComptrollerField,
        cancel: &CancellationToken,
    ) -> Result<Address, ChainError> {
        let comptroller = IComptroller::new(contract, &self.provider);

        let read = async {
            match field {
                ComptrollerField::Admin => comptroller.admin().call().await.map(|r| r._0),
                ComptrollerField::PendingAdmin => {
                    comptroller.pendingAdmin().call().await.map(|r| r._0)
                }
                ComptrollerField::Implementation => comptroller
                    .comptrollerImplementation()
                    .call()
                    .await
                    .map(|r| r._0),
                ComptrollerField::PendingImplementation => comptroller
                    .pendingComptrollerImplementation()
                    .call()
                    .await
                    .map(|r| r._0),
            }
        };

        let value = cancel
            .run_until_cancelled(read)
            .await
            .ok_or(ChainError::Cancelled)?
            .map_err(|source| ChainError::Read {
                contract,
                field,
                source,
            })?;

        debug!(contract = %contract, field = %field, value = %value, "Read contract field");
        Ok(value)
    }

    async fn gas_params(&self, cancel: &CancellationToken) -> Result<GasParams, ChainError> {
        cancel
            .run_until_cancelled(self.gas_strategy.fetch_params(&self.provider))
            .await
            .ok_or(ChainError::Cancelled)?
            .map_err(ChainError::Gas)
    }

    #[instrument(skip_all, fields(borrower = %intent.borrower, market = %intent.market))]
    async fn submit(
        &self,
        intent: &LiquidationIntent,
        cancel: &CancellationToken,
    ) -> Result<TxReceipt, ChainError> {
        let start = Instant::now();
        let tx = self.liquidation_request(intent);

        info!(
            collateral = %intent.collateral,
            repay_amount = %intent.repay_amount,
            gas_strategy = self.gas_strategy.strategy_name(),
            gas_price_gwei = intent.gas.effective_gas_price() / 1_000_000_000,
            "Sending liquidation"
        );

        let pending = cancel
            .run_until_cancelled(self.provider.send_transaction(tx))
            .await
            .ok_or(ChainError::Cancelled)??;
        let tx_hash = *pending.tx_hash();

        info!(
            tx_hash = %tx_hash,
            submit_ms = start.elapsed().as_millis(),
            "Transaction submitted, waiting for confirmation"
        );

        let watch = pending.with_timeout(Some(self.receipt_timeout)).get_receipt();
        let receipt = match cancel.run_until_cancelled(watch).await {
            Some(Ok(receipt)) => receipt,
            Some(Err(PendingTransactionError::TxWatcher(WatchTxError::Timeout))) => {
                warn!(tx_hash = %tx_hash, timeout_secs = self.receipt_timeout.as_secs(), "No receipt before timeout, outcome unknown");
                return Err(ChainError::Unconfirmed {
                    tx_hash,
                    reason: format!("no receipt within {:?}", self.receipt_timeout),
                });
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                warn!(tx_hash = %tx_hash, "Shutdown while awaiting receipt, outcome unknown");
                return Err(ChainError::Unconfirmed {
                    tx_hash,
                    reason: "cancelled while awaiting receipt".to_string(),
                });
            }
        };

        if !receipt.status() {
            warn!(tx_hash = %tx_hash, "Transaction reverted");
            return Err(ChainError::Reverted(tx_hash));
        }

        info!(
            tx_hash = %tx_hash,
            block = receipt.block_number.unwrap_or(0),
            gas_used = receipt.gas_used,
            total_ms = start.elapsed().as_millis(),
            "Transaction confirmed"
        );

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}
