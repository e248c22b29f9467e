//! Wire types of the settlement endpoints.
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }`;
//! failures are `{ "error": <reason>, "message": <text> }` where the reason
//! is a stable snake_case tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Canonical on-chain reference recorded for the purchase.
    pub tx_hash: String,
    /// The unlocked target URL.
    pub unlocked_content: String,
}

/// Success envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSuccess<T> {
    /// Always `true`.
    pub success: bool,
    /// Response payload.
    pub data: T,
}

impl<T> ApiSuccess<T> {
    /// Wraps `data` in a success envelope.
    pub const fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Error body returned by the settlement endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable reason.
    pub error: ErrorReason,
    /// Human-readable explanation.
    pub message: String,
}

/// Body of `POST /api/pay/direct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPaymentRequest {
    /// Product being bought.
    pub product_id: String,
    /// Transaction hash (EVM) or signature (Solana).
    pub tx_hash: String,
    /// Network name (`base` or `solana`).
    pub network: String,
    /// Buyer wallet address.
    pub buyer_address: String,
}

/// Stable reason tags for settlement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The product does not exist.
    NotFound,
    /// The product has been deactivated.
    Unavailable,
    /// The product's quantity cap has been reached.
    SoldOut,
    /// The on-chain reference was already used for a purchase.
    Replay,
    /// The proof does not authorize the expected payment.
    InvalidProof,
    /// The request or envelope is malformed.
    InvalidRequest,
    /// A storage or server failure.
    InternalError,
    /// A reason this client does not know.
    #[serde(other)]
    Unknown,
}

impl ErrorReason {
    /// The wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::SoldOut => "sold_out",
            Self::Replay => "replay",
            Self::InvalidProof => "invalid_proof",
            Self::InvalidRequest => "invalid_request",
            Self::InternalError => "internal_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
