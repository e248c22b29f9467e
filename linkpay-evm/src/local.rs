//! A private-key wallet talking to an EVM node over HTTP.

use alloy_network::EthereumWallet;
use alloy_primitives::{Address, B256, Signature, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionReceipt;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use async_trait::async_trait;
use linkpay::wallet::WalletError;
use url::Url;

use crate::wallet::{EvmWallet, ReceiptStatus};

sol! {
    /// The slice of ERC-20 used for direct payments.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// An [`EvmWallet`] holding its own key.
///
/// Used by scripted buyers and integration setups where no browser wallet
/// is involved.
pub struct LocalEvmWallet {
    signer: PrivateKeySigner,
    provider: DynProvider,
}

impl std::fmt::Debug for LocalEvmWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEvmWallet")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl LocalEvmWallet {
    /// Connects `signer` to the node at `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Failed`] if the key cannot be duplicated for
    /// the transaction filler.
    pub fn new(signer: PrivateKeySigner, rpc_url: Url) -> Result<Self, WalletError> {
        let tx_signer = PrivateKeySigner::from_bytes(&signer.to_bytes())
            .map_err(|e| WalletError::Failed(e.to_string()))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(tx_signer))
            .connect_http(rpc_url)
            .erased();
        Ok(Self { signer, provider })
    }

    /// Parses a hex private key and connects it to `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Failed`] if the key is malformed.
    pub fn from_private_key(private_key: &str, rpc_url: Url) -> Result<Self, WalletError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| WalletError::Failed(format!("invalid private key: {e}")))?;
        Self::new(signer, rpc_url)
    }

    /// Token balance of the wallet's own account.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Failed`] if the call fails.
    pub async fn token_balance(&self, token: Address) -> Result<U256, WalletError> {
        IERC20::new(token, &self.provider)
            .balanceOf(self.signer.address())
            .call()
            .await
            .map_err(|e| WalletError::Failed(e.to_string()))
    }
}

fn receipt_status(receipt: Option<&TransactionReceipt>) -> ReceiptStatus {
    match receipt {
        None => ReceiptStatus::Pending,
        Some(r) if r.status() => ReceiptStatus::Success,
        Some(_) => ReceiptStatus::Reverted,
    }
}

#[async_trait]
impl EvmWallet for LocalEvmWallet {
    fn address(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError> {
        alloy_signer::Signer::sign_hash(&self.signer, hash)
            .await
            .map_err(|e| WalletError::Failed(e.to_string()))
    }

    async fn transfer_token(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, WalletError> {
        let pending = IERC20::new(token, &self.provider)
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| WalletError::Failed(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn receipt_status(&self, tx_hash: B256) -> Result<ReceiptStatus, WalletError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| WalletError::Failed(e.to_string()))?;
        Ok(receipt_status(receipt.as_ref()))
    }
}
