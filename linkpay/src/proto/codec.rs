//! Transport encoding for x402 envelopes: JSON, then standard base64.
//!
//! The encoded strings are safe to place in an HTTP header or a JSON body.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Authorization, ExactPayload, PaymentPayload, PaymentRequired, PaymentRequirements};
use crate::constants::{EXACT_SCHEME, MAX_TIMEOUT_SECONDS, X402_VERSION};
use crate::error::ProtocolError;
use crate::timestamp::UnixTimestamp;

/// Serializes a value to JSON and base64-encodes it.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_vec(value)?;
    Ok(b64.encode(json))
}

/// Base64-decodes a string and parses the JSON inside.
///
/// # Errors
///
/// Returns [`ProtocolError`] if either layer is malformed.
pub fn decode<T: DeserializeOwned>(encoded: &str) -> Result<T, ProtocolError> {
    let bytes = b64.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builds a single-offer `PaymentRequired` envelope and encodes it.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
pub fn encode_payment_required(
    pay_to: &str,
    amount: &str,
    network: &str,
    resource: &str,
    asset: &str,
) -> Result<String, ProtocolError> {
    let envelope = PaymentRequired::new(vec![PaymentRequirements::exact(
        pay_to, amount, network, resource, asset,
    )]);
    encode(&envelope)
}

/// Decodes and validates a `PaymentRequired` envelope.
///
/// # Errors
///
/// Returns [`ProtocolError`] on bad encoding, a shape mismatch, an unknown
/// version, or an envelope without offers.
pub fn decode_payment_required(encoded: &str) -> Result<PaymentRequired, ProtocolError> {
    let envelope: PaymentRequired = decode(encoded)?;
    check_version(envelope.x402_version)?;
    if envelope.accepts.is_empty() {
        return Err(ProtocolError::NoOffers);
    }
    Ok(envelope)
}

/// Builds a `PaymentPayload` valid from the epoch until 300 seconds from now,
/// and encodes it.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
pub fn create_payment_payload(
    network: &str,
    signature: &str,
    from: &str,
    to: &str,
    value: &str,
    nonce: &str,
) -> Result<String, ProtocolError> {
    let payload = PaymentPayload {
        x402_version: X402_VERSION,
        scheme: EXACT_SCHEME.to_owned(),
        network: network.to_owned(),
        payload: ExactPayload {
            signature: signature.to_owned(),
            authorization: Authorization {
                from: from.to_owned(),
                to: to.to_owned(),
                value: value.to_owned(),
                valid_after: UnixTimestamp::EPOCH,
                valid_before: UnixTimestamp::now() + MAX_TIMEOUT_SECONDS,
                nonce: nonce.to_owned(),
            },
        },
    };
    encode(&payload)
}

/// Decodes and validates a `PaymentPayload` envelope.
///
/// # Errors
///
/// Returns [`ProtocolError`] on bad encoding, a shape mismatch, an unknown
/// version or a scheme other than `exact`.
pub fn decode_payment_payload(encoded: &str) -> Result<PaymentPayload, ProtocolError> {
    let payload: PaymentPayload = decode(encoded)?;
    check_version(payload.x402_version)?;
    if payload.scheme != EXACT_SCHEME {
        return Err(ProtocolError::UnsupportedScheme(payload.scheme));
    }
    Ok(payload)
}

const fn check_version(version: u8) -> Result<(), ProtocolError> {
    if version == X402_VERSION {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedVersion(version))
    }
}
