//! Wallet capability model.
//!
//! A wallet is picked at configuration time from a fixed set of families;
//! each chain adapter then talks to it through a narrow signing interface
//! (`EvmWallet` in `linkpay-evm`, `SolanaWallet` in `linkpay-svm`).
//! Failures reported by a wallet are mapped onto [`AdapterError`] at the
//! adapter boundary.

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::network::ChainFamily;

/// Supported wallet families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletFamily {
    /// A browser-injected EVM provider.
    EvmInjected,
    /// An EVM wallet reached over WalletConnect.
    EvmWalletConnect,
    /// A Solana wallet adapter.
    Solana,
}

impl WalletFamily {
    /// Chain family this wallet can sign for.
    #[must_use]
    pub const fn chain_family(self) -> ChainFamily {
        match self {
            Self::EvmInjected | Self::EvmWalletConnect => ChainFamily::Evm,
            Self::Solana => ChainFamily::Solana,
        }
    }
}

/// Static description of a configured wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDescriptor {
    /// Display name.
    pub name: String,
    /// Icon URL or data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Wallet family.
    pub family: WalletFamily,
}

/// Failure reported by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// No account is connected.
    #[error("wallet not connected")]
    NotConnected,
    /// The owner declined the request.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Anything else the wallet reported.
    #[error("wallet failure: {0}")]
    Failed(String),
}

impl From<WalletError> for AdapterError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => Self::Configuration("wallet not connected".to_owned()),
            WalletError::Rejected(_) => Self::UserCancelled,
            WalletError::Failed(msg) if mentions_insufficient_funds(&msg) => {
                Self::InsufficientFunds(msg)
            }
            WalletError::Failed(msg) => Self::Chain(msg),
        }
    }
}

fn mentions_insufficient_funds(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("insufficient funds")
        || lower.contains("insufficient balance")
        || lower.contains("exceeds balance")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_errors_map_to_adapter_errors() {
        assert!(matches!(
            AdapterError::from(WalletError::NotConnected),
            AdapterError::Configuration(_)
        ));
        assert_eq!(
            AdapterError::from(WalletError::Rejected("User denied".into())),
            AdapterError::UserCancelled
        );
        assert!(matches!(
            AdapterError::from(WalletError::Failed(
                "ERC20: transfer amount exceeds balance".into()
            )),
            AdapterError::InsufficientFunds(_)
        ));
        assert!(matches!(
            AdapterError::from(WalletError::Failed("nonce too low".into())),
            AdapterError::Chain(_)
        ));
    }

    #[test]
    fn families_pick_chain() {
        assert_eq!(WalletFamily::EvmWalletConnect.chain_family(), ChainFamily::Evm);
        assert_eq!(WalletFamily::Solana.chain_family(), ChainFamily::Solana);
    }
}
