//! Offline verification of x402 `exact` payloads.
//!
//! Recovers the EIP-712 signer of a `TransferWithAuthorization` and checks
//! the authorization against what the seller expects to receive. Nothing
//! here touches the chain: a valid signature proves intent to pay, not that
//! the transfer has been executed.

use alloy_primitives::{Address, B256, Bytes, Signature, U256, hex};
use linkpay::proto::PaymentPayload;
use linkpay::{Network, UnixTimestamp};

use crate::authorization::SignedAuthorization;
use crate::networks::UsdcDeployment;

/// Why a payload does not prove the expected payment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProofError {
    /// A field could not be parsed.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// The payload names a network without a USDC deployment.
    #[error("unsupported network {0}")]
    UnsupportedNetwork(String),
    /// The signature does not recover to `authorization.from`.
    #[error("signature was not produced by the payer")]
    InvalidSignature,
    /// `authorization.from` is not the buyer.
    #[error("payer does not match buyer")]
    PayerMismatch,
    /// `authorization.to` is not the seller.
    #[error("payment recipient does not match the product creator")]
    RecipientMismatch,
    /// `authorization.value` is below the price.
    #[error("authorized amount {authorized} is below price {required}")]
    InsufficientValue {
        /// Authorized base units.
        authorized: U256,
        /// Required base units.
        required: U256,
    },
    /// The authorization is not valid yet.
    #[error("authorization is not yet valid")]
    Early,
    /// The authorization has expired.
    #[error("authorization has expired")]
    Expired,
}

/// What the seller expects the authorization to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedPayment {
    /// The buyer claiming the purchase.
    pub buyer: Address,
    /// The product creator.
    pub pay_to: Address,
    /// Price in base units.
    pub min_value: U256,
}

/// Parses the string fields of an `exact` payload into typed values.
///
/// # Errors
///
/// Returns [`ProofError::Malformed`] or [`ProofError::UnsupportedNetwork`].
pub fn parse_payload(payload: &PaymentPayload) -> Result<SignedAuthorization, ProofError> {
    let network: Network = payload
        .network
        .parse()
        .map_err(|_| ProofError::UnsupportedNetwork(payload.network.clone()))?;
    UsdcDeployment::for_network(network)
        .ok_or_else(|| ProofError::UnsupportedNetwork(payload.network.clone()))?;
    let auth = &payload.payload.authorization;
    Ok(SignedAuthorization {
        network,
        from: parse_field("from", &auth.from)?,
        to: parse_field("to", &auth.to)?,
        value: parse_field("value", &auth.value)?,
        valid_after: auth.valid_after,
        valid_before: auth.valid_before,
        nonce: parse_field::<B256>("nonce", &auth.nonce)?,
        signature: Bytes::from(
            hex::decode(&payload.payload.signature)
                .map_err(|e| ProofError::Malformed(format!("signature: {e}")))?,
        ),
    })
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ProofError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ProofError::Malformed(format!("{name}: {e}")))
}

/// Recovers the address that signed `authorization`.
///
/// # Errors
///
/// Returns [`ProofError::InvalidSignature`] if the signature is not a
/// recoverable 65-byte ECDSA signature.
pub fn recover_signer(authorization: &SignedAuthorization) -> Result<Address, ProofError> {
    let deployment = UsdcDeployment::for_network(authorization.network)
        .ok_or_else(|| ProofError::UnsupportedNetwork(authorization.network.to_string()))?;
    let signature = Signature::from_raw(&authorization.signature)
        .map_err(|_| ProofError::InvalidSignature)?
        .normalized_s();
    let hash = alloy_sol_types::SolStruct::eip712_signing_hash(
        &authorization.message(),
        &deployment.domain(),
    );
    signature
        .recover_address_from_prehash(&hash)
        .map_err(|_| ProofError::InvalidSignature)
}

/// Checks the authorization window against `now`.
///
/// A deadline less than six seconds away counts as expired, leaving room
/// for the request to be processed.
///
/// # Errors
///
/// Returns [`ProofError::Expired`] or [`ProofError::Early`].
pub fn check_window(
    valid_after: UnixTimestamp,
    valid_before: UnixTimestamp,
    now: UnixTimestamp,
) -> Result<(), ProofError> {
    if valid_before < now + 6 {
        return Err(ProofError::Expired);
    }
    if valid_after > now {
        return Err(ProofError::Early);
    }
    Ok(())
}

/// Verifies that `payload` is a correctly signed authorization for `expected`.
///
/// # Errors
///
/// Returns the first [`ProofError`] encountered.
pub fn verify_payload(
    payload: &PaymentPayload,
    expected: &ExpectedPayment,
    now: UnixTimestamp,
) -> Result<SignedAuthorization, ProofError> {
    let authorization = parse_payload(payload)?;
    if recover_signer(&authorization)? != authorization.from {
        return Err(ProofError::InvalidSignature);
    }
    if authorization.from != expected.buyer {
        return Err(ProofError::PayerMismatch);
    }
    if authorization.to != expected.pay_to {
        return Err(ProofError::RecipientMismatch);
    }
    if authorization.value < expected.min_value {
        return Err(ProofError::InsufficientValue {
            authorized: authorization.value,
            required: expected.min_value,
        });
    }
    check_window(authorization.valid_after, authorization.valid_before, now)?;
    Ok(authorization)
}
