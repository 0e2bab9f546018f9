//! Chain interaction layer for the liquidation bot.
//!
//! This crate provides:
//! - Contract bindings for the Unitroller and CToken markets
//! - Gas strategy abstraction (Legacy + EIP-1559)
//! - A signing [`ChainClient`] that submits `liquidateBorrow` and waits for receipts

mod client;
mod contracts;
pub mod gas;
mod signer;

pub use client::{
    ChainClient, ChainError, LiquidationIntent, RpcChainClient, TxReceipt, DEFAULT_RECEIPT_TIMEOUT,
};
pub use contracts::{encode_liquidate_borrow, ComptrollerField, IComptroller, ICToken};
pub use gas::{create_gas_strategy, GasParams, GasPricingModel, GasStrategy};
pub use signer::signer_from_hex;
