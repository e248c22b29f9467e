//! Error taxonomy for the protocol codec and the chain adapters.
//!
//! Errors are classified where they originate. Only [`AdapterError::Rpc`]
//! is considered transient: it is the one kind that may trigger a silent
//! retry against a fallback endpoint. Everything else surfaces to the
//! payment orchestrator unchanged, which maps it to a human-readable string
//! via [`AdapterError::user_message`].

/// A malformed x402 envelope.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The transport encoding is not valid base64.
    #[error("invalid base64 encoding: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes are not JSON matching the envelope shape.
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
    /// The envelope declares a protocol version this implementation does not speak.
    #[error("unsupported x402 version {0}")]
    UnsupportedVersion(u8),
    /// The envelope declares a scheme other than `exact`.
    #[error("unsupported payment scheme {0:?}")]
    UnsupportedScheme(String),
    /// A `PaymentRequired` envelope without any offer.
    #[error("payment required envelope has no offers")]
    NoOffers,
}

/// Failure of a chain adapter operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AdapterError {
    /// No wallet is connected, or the adapter is missing a required setting.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The wallet owner declined to sign.
    #[error("user cancelled the request")]
    UserCancelled,
    /// On-chain submission, revert, or receipt failure.
    #[error("chain error: {0}")]
    Chain(String),
    /// Transient transport failure talking to an RPC endpoint.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The payer's token balance does not cover the transfer.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// An envelope could not be produced or parsed.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AdapterError {
    /// Whether this failure is transient and may be retried on another endpoint.
    #[must_use]
    pub const fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// The message shown to the buyer when an attempt ends in this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => "Wallet not connected.".to_owned(),
            Self::UserCancelled => "Transaction was cancelled.".to_owned(),
            Self::InsufficientFunds(_) => {
                "Insufficient USDC balance to complete this purchase.".to_owned()
            }
            Self::Rpc(_) => {
                "The network is busy right now. Please try again in a moment.".to_owned()
            }
            Self::Chain(msg) => format!("Transaction failed: {msg}"),
            Self::Protocol(msg) => format!("Payment could not be prepared: {msg}"),
        }
    }
}

impl From<ProtocolError> for AdapterError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
