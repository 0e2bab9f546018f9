//! Deployment values supplied through the environment.

use super::ConfigError;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use liqbot_chain::signer_from_hex;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Everything the bot needs to talk to one Compound v2 deployment.
#[derive(Clone)]
pub struct DeploymentConfig {
    pub rpc_url: Url,
    pub signer: PrivateKeySigner,
    /// Unitroller address, read at startup.
    pub comptroller: Address,
    /// cToken market whose borrows are repaid.
    pub market: Address,
    /// cToken market collateral is seized from.
    pub collateral: Address,
    /// Repay amount in the borrowed asset's base units.
    pub repay_amount: U256,
    pub update_interval: Duration,
}

impl fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("signer", &self.signer.address())
            .field("comptroller", &self.comptroller)
            .field("market", &self.market)
            .field("collateral", &self.collateral)
            .field("repay_amount", &self.repay_amount)
            .field("update_interval", &self.update_interval)
            .finish()
    }
}

impl DeploymentConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let rpc_url = require("RPC_URL")?;
        let rpc_url = Url::parse(&rpc_url).map_err(|e| invalid("RPC_URL", e))?;

        // The key itself must never end up in an error message.
        let signer = signer_from_hex(&require("PRIVATE_KEY")?).map_err(|_| ConfigError::Invalid {
            var: "PRIVATE_KEY",
            reason: "not a valid hex secp256k1 private key".to_string(),
        })?;

        let comptroller = parse_address("CONTRACT_COMPTROLLER_ADDRESS", &require("CONTRACT_COMPTROLLER_ADDRESS")?)?;
        let market = parse_address("CONTRACT_CTOKEN_ADDRESS", &require("CONTRACT_CTOKEN_ADDRESS")?)?;
        let collateral = parse_address("CONTRACT_COLLATERAL_ADDRESS", &require("CONTRACT_COLLATERAL_ADDRESS")?)?;

        let repay_amount = U256::from_str_radix(&require("REPAY_AMOUNT")?, 10)
            .map_err(|e| invalid("REPAY_AMOUNT", e))?;
        if repay_amount.is_zero() {
            return Err(invalid("REPAY_AMOUNT", "must be greater than zero"));
        }

        let interval_secs: u64 = require("UPDATE_INTERVAL_SECONDS")?
            .parse()
            .map_err(|e| invalid("UPDATE_INTERVAL_SECONDS", e))?;
        if interval_secs == 0 {
            return Err(invalid("UPDATE_INTERVAL_SECONDS", "must be greater than zero"));
        }

        Ok(Self {
            rpc_url,
            signer,
            comptroller,
            market,
            collateral,
            repay_amount,
            update_interval: Duration::from_secs(interval_secs),
        })
    }

    /// Log the deployment without secrets.
    pub fn log_config(&self) {
        tracing::info!(
            rpc_host = self.rpc_url.host_str().unwrap_or("?"),
            liquidator = %self.signer.address(),
            comptroller = %self.comptroller,
            market = %self.market,
            collateral = %self.collateral,
            repay_amount = %self.repay_amount,
            update_interval_secs = self.update_interval.as_secs(),
            "Deployment configuration loaded"
        );
    }
}

fn invalid(var: &'static str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

fn parse_address(var: &'static str, raw: &str) -> Result<Address, ConfigError> {
    let address: Address = raw.parse().map_err(|e| invalid(var, e))?;
    if address.is_zero() {
        return Err(invalid(var, "zero address"));
    }
    Ok(address)
}
