//! The two x402 wire envelopes.
//!
//! A server answers an unpaid request with a [`PaymentRequired`] listing the
//! offers it accepts; the client answers with a [`PaymentPayload`] proving
//! it authorized a transfer matching one of them. Both are serialized as
//! camelCase JSON and carried base64-encoded (see [`codec`]).

pub mod codec;

use serde::{Deserialize, Serialize};

use crate::constants::{EXACT_SCHEME, MAX_TIMEOUT_SECONDS, X402_VERSION};
use crate::timestamp::UnixTimestamp;

pub use codec::{
    create_payment_payload, decode_payment_payload, decode_payment_required,
    encode_payment_required,
};

/// What a payer must do to unlock a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version.
    pub x402_version: u8,
    /// Accepted payment offers.
    pub accepts: Vec<PaymentRequirements>,
    /// Optional explanation, e.g. why a previous payment was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single payment offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme; always `exact`.
    pub scheme: String,
    /// CAIP-2 network identifier.
    pub network: String,
    /// Required amount in token base units, as a decimal string.
    pub max_amount_required: String,
    /// Identifier of the resource being unlocked.
    pub resource: String,
    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// MIME type of the resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// Payee address.
    pub pay_to: String,
    /// Seconds the offer stays valid.
    pub max_timeout_seconds: u64,
    /// Token contract or mint address.
    pub asset: String,
    /// Scheme-specific extras (EIP-712 domain name and version for EVM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// An `exact` offer with the standard 300 second timeout.
    #[must_use]
    pub fn exact(
        pay_to: impl Into<String>,
        amount: impl Into<String>,
        network: impl Into<String>,
        resource: impl Into<String>,
        asset: impl Into<String>,
    ) -> Self {
        Self {
            scheme: EXACT_SCHEME.to_owned(),
            network: network.into(),
            max_amount_required: amount.into(),
            resource: resource.into(),
            description: String::new(),
            mime_type: String::new(),
            pay_to: pay_to.into(),
            max_timeout_seconds: MAX_TIMEOUT_SECONDS,
            asset: asset.into(),
            extra: None,
        }
    }
}

impl PaymentRequired {
    /// Wraps offers into a current-version envelope.
    #[must_use]
    pub const fn new(accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts,
            error: None,
        }
    }
}

/// Proof of an authorized transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version.
    pub x402_version: u8,
    /// Payment scheme; always `exact`.
    pub scheme: String,
    /// CAIP-2 network identifier.
    pub network: String,
    /// Signature and the authorization it covers.
    pub payload: ExactPayload,
}

/// Signed transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    /// Hex-encoded signature over the authorization.
    pub signature: String,
    /// The authorized transfer.
    pub authorization: Authorization,
}

/// EIP-3009 style transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Payer address.
    pub from: String,
    /// Payee address.
    pub to: String,
    /// Amount in base units, as a decimal string.
    pub value: String,
    /// Not valid before this instant.
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this instant.
    pub valid_before: UnixTimestamp,
    /// 32-byte hex nonce.
    pub nonce: String,
}

impl Authorization {
    /// Whether `now` falls inside `[valid_after, valid_before)`.
    #[must_use]
    pub fn is_valid_at(&self, now: UnixTimestamp) -> bool {
        self.valid_after <= now && now < self.valid_before
    }
}
