//! HTTP and protocol constants shared by clients and the settlement server.

/// x402 protocol version emitted and accepted by this implementation.
pub const X402_VERSION: u8 = 1;

/// The only payment scheme offered: pay the exact listed amount.
pub const EXACT_SCHEME: &str = "exact";

/// Lifetime of an offer and of a signed authorization, in seconds.
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Header carrying an encoded `PaymentPayload` (client → server).
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header carrying an encoded `PaymentRequired` (server → client).
pub const X_PAYMENT_REQUIRED_HEADER: &str = "X-PAYMENT-REQUIRED";

/// Header carrying the buyer's wallet address.
pub const X_BUYER_ADDRESS_HEADER: &str = "X-BUYER-ADDRESS";

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;
