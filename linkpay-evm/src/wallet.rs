//! The EVM wallet seam.

use alloy_primitives::{Address, B256, Signature, U256};
use async_trait::async_trait;
use linkpay::wallet::WalletError;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Not mined yet.
    Pending,
    /// Mined and succeeded.
    Success,
    /// Mined and reverted.
    Reverted,
}

/// What the EVM adapter needs from a connected wallet.
///
/// Implemented by [`LocalEvmWallet`](crate::local::LocalEvmWallet) for
/// private keys, and by whatever bridges an injected or WalletConnect wallet.
#[async_trait]
pub trait EvmWallet: Send + Sync {
    /// The connected account, if any.
    fn address(&self) -> Option<Address>;

    /// Signs a 32-byte digest (an EIP-712 hash).
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError>;

    /// Sends an ERC-20 `transfer(to, amount)` on `token`, returning the
    /// transaction hash once broadcast.
    async fn transfer_token(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, WalletError>;

    /// Looks up the receipt for a broadcast transaction.
    async fn receipt_status(&self, tx_hash: B256) -> Result<ReceiptStatus, WalletError>;
}
