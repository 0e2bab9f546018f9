//! Compound v2 contract interfaces.
//!
//! Subsets of the Unitroller/Comptroller and CToken ABIs needed for a
//! connectivity check and for `liquidateBorrow`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Unitroller admin surface (the proxy in front of the Comptroller)
    #[sol(rpc)]
    interface IComptroller {
        function admin() external view returns (address);
        function pendingAdmin() external view returns (address);
        function comptrollerImplementation() external view returns (address);
        function pendingComptrollerImplementation() external view returns (address);
    }
}

sol! {
    /// CToken market interface (subset for liquidation)
    #[sol(rpc)]
    interface ICToken {
        /// Repay `repayAmount` of the borrower's debt in this market and seize
        /// collateral from `cTokenCollateral`. Returns 0 on success.
        function liquidateBorrow(
            address borrower,
            uint256 repayAmount,
            address cTokenCollateral
        ) external returns (uint256);
    }
}

/// Address-valued Unitroller fields readable through the chain client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComptrollerField {
    Admin,
    PendingAdmin,
    Implementation,
    PendingImplementation,
}

impl ComptrollerField {
    /// Solidity getter name.
    pub fn name(&self) -> &'static str {
        match self {
            ComptrollerField::Admin => "admin",
            ComptrollerField::PendingAdmin => "pendingAdmin",
            ComptrollerField::Implementation => "comptrollerImplementation",
            ComptrollerField::PendingImplementation => "pendingComptrollerImplementation",
        }
    }
}

impl std::fmt::Display for ComptrollerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Encode `liquidateBorrow(borrower, repayAmount, cTokenCollateral)` calldata.
pub fn encode_liquidate_borrow(
    borrower: Address,
    repay_amount: U256,
    collateral: Address,
) -> Bytes {
    let call = ICToken::liquidateBorrowCall {
        borrower,
        repayAmount: repay_amount,
        cTokenCollateral: collateral,
    };
    Bytes::from(call.abi_encode())
}
