//! Ledger errors.

use linkpay::ProtocolError;
use linkpay::amount::AmountError;
use linkpay::settlement::ErrorReason;
use linkpay_evm::verify::ProofError;

/// Why a settlement or ledger operation failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// No product with this id.
    #[error("product {0} not found")]
    NotFound(String),
    /// The product has been deactivated.
    #[error("product {0} is not available")]
    Unavailable(String),
    /// The product's quantity cap has been reached.
    #[error("product {0} is sold out")]
    SoldOut(String),
    /// The on-chain reference already settled a purchase.
    #[error("transaction {0} has already been used")]
    Replay(String),
    /// The proof does not authorize the expected payment.
    #[error("invalid payment proof: {0}")]
    InvalidProof(String),
    /// Malformed request data.
    #[error("invalid request: {0}")]
    Protocol(String),
    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Storage failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// Filesystem failure preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Stable reason tag reported to clients.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::NotFound(_) => ErrorReason::NotFound,
            Self::Unavailable(_) => ErrorReason::Unavailable,
            Self::SoldOut(_) => ErrorReason::SoldOut,
            Self::Replay(_) => ErrorReason::Replay,
            Self::InvalidProof(_) => ErrorReason::InvalidProof,
            Self::Protocol(_) => ErrorReason::InvalidRequest,
            Self::Corrupt(_) | Self::Database(_) | Self::Migration(_) | Self::Io(_) => {
                ErrorReason::InternalError
            }
        }
    }

    /// Whether this is a storage-side failure rather than a rejection.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.reason(), ErrorReason::InternalError)
    }
}

impl From<ProtocolError> for LedgerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ProofError> for LedgerError {
    fn from(err: ProofError) -> Self {
        Self::InvalidProof(err.to_string())
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        Self::Protocol(err.to_string())
    }
}
