//! Canonical on-chain references for EVM payments.
//!
//! USDC accepts a `TransferWithAuthorization` nonce once per payer, so an
//! x402 payment is recorded under `keccak256(chainId ‖ token ‖ from ‖ nonce)`.
//! The signature bytes are not part of the key: the same signature has
//! several valid encodings (`v` as 27/28 or 0/1, high or low `s`). A direct
//! transfer is recorded under its transaction hash.

use alloy_primitives::{Address, B256, U256, keccak256};

use crate::authorization::SignedAuthorization;
use crate::networks::UsdcDeployment;

/// A reference string that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid reference: {0}")]
pub struct InvalidReference(pub String);

/// `0x`-prefixed lowercase key identifying the authorization itself.
///
/// # Errors
///
/// Returns [`InvalidReference`] if the authorization is not for an EVM
/// network with a USDC deployment.
pub fn authorization_reference(
    authorization: &SignedAuthorization,
) -> Result<String, InvalidReference> {
    let deployment = UsdcDeployment::for_network(authorization.network).ok_or_else(|| {
        InvalidReference(format!("no USDC deployment on {}", authorization.network))
    })?;
    Ok(nonce_key(
        deployment.chain_id,
        deployment.address,
        authorization.from,
        authorization.nonce,
    )
    .to_string())
}

fn nonce_key(chain_id: u64, token: Address, from: Address, nonce: B256) -> B256 {
    let mut preimage = Vec::with_capacity(32 + 20 + 20 + 32);
    preimage.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    preimage.extend_from_slice(token.as_slice());
    preimage.extend_from_slice(from.as_slice());
    preimage.extend_from_slice(nonce.as_slice());
    keccak256(preimage)
}

/// Normalizes a transaction hash to `0x`-prefixed lowercase hex.
///
/// # Errors
///
/// Returns [`InvalidReference`] unless `tx_hash` is 32 bytes of hex.
pub fn tx_hash_reference(tx_hash: &str) -> Result<String, InvalidReference> {
    tx_hash
        .trim()
        .parse::<B256>()
        .map(|h| h.to_string())
        .map_err(|e| InvalidReference(e.to_string()))
}
