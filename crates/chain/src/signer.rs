//! Signing key loading.

use crate::client::ChainError;
use alloy::signers::local::PrivateKeySigner;

/// Parse a hex private key, with or without the `0x` prefix.
pub fn signer_from_hex(private_key: &str) -> Result<PrivateKeySigner, ChainError> {
    let key_str = private_key.trim().trim_start_matches("0x");
    Ok(key_str.parse::<PrivateKeySigner>()?)
}
