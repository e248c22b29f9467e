//! The EVM chain adapter.

use alloy_primitives::{Address, B256, Bytes, U256};
use linkpay::{AdapterError, Network};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::authorization::{SignedAuthorization, UnsignedAuthorization};
use crate::networks::UsdcDeployment;
use crate::wallet::{EvmWallet, ReceiptStatus};

/// How long to wait for a direct transfer to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between receipt lookups.
pub const DEFAULT_RECEIPT_POLL: Duration = Duration::from_secs(2);

/// Signs x402 authorizations and submits direct USDC transfers through a
/// connected [`EvmWallet`].
#[derive(Clone)]
pub struct EvmAdapter {
    wallet: Arc<dyn EvmWallet>,
    receipt_timeout: Duration,
    receipt_poll: Duration,
}

impl std::fmt::Debug for EvmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmAdapter")
            .field("address", &self.wallet.address())
            .field("receipt_timeout", &self.receipt_timeout)
            .finish_non_exhaustive()
    }
}

impl EvmAdapter {
    /// Creates an adapter with the default receipt timeout.
    #[must_use]
    pub fn new(wallet: Arc<dyn EvmWallet>) -> Self {
        Self {
            wallet,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            receipt_poll: DEFAULT_RECEIPT_POLL,
        }
    }

    /// Overrides receipt timeout and poll interval.
    #[must_use]
    pub const fn with_receipt_timing(mut self, timeout: Duration, poll: Duration) -> Self {
        self.receipt_timeout = timeout;
        self.receipt_poll = poll;
        self
    }

    /// The connected account.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.wallet.address()
    }

    fn connected_payer(&self, payer: Address) -> Result<(), AdapterError> {
        match self.wallet.address() {
            None => Err(AdapterError::Configuration("wallet not connected".to_owned())),
            Some(connected) if connected != payer => Err(AdapterError::Configuration(format!(
                "connected account {connected} is not the payer {payer}"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Signs a `TransferWithAuthorization` of `amount` base units from
    /// `payer` to `pay_to`, valid for 300 seconds. Nothing is submitted.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Configuration`] without a matching connected wallet or
    /// for a non-EVM network, [`AdapterError::UserCancelled`] if signing is
    /// declined.
    #[tracing::instrument(skip(self), err)]
    pub async fn sign_authorization(
        &self,
        payer: Address,
        pay_to: Address,
        amount: U256,
        network: Network,
    ) -> Result<SignedAuthorization, AdapterError> {
        self.connected_payer(payer)?;
        let deployment = deployment(network)?;
        let unsigned = UnsignedAuthorization::new(deployment, payer, pay_to, amount);
        let signature = self.wallet.sign_hash(&unsigned.signing_hash()).await?;
        tracing::debug!(nonce = %unsigned.message.nonce, "authorization signed");
        Ok(unsigned.into_signed(Bytes::from(signature.as_bytes().to_vec())))
    }

    /// Sends `amount` USDC base units from `payer` to `pay_to` and waits for
    /// the receipt.
    ///
    /// # Errors
    ///
    /// As for [`broadcast_direct_transfer`](Self::broadcast_direct_transfer)
    /// and [`await_receipt`](Self::await_receipt).
    pub async fn submit_direct_transfer(
        &self,
        payer: Address,
        pay_to: Address,
        amount: U256,
        network: Network,
    ) -> Result<B256, AdapterError> {
        let tx_hash = self
            .broadcast_direct_transfer(payer, pay_to, amount, network)
            .await?;
        self.await_receipt(tx_hash).await?;
        Ok(tx_hash)
    }

    /// Sends `amount` USDC base units from `payer` to `pay_to` and returns
    /// once the wallet has broadcast the transaction.
    ///
    /// # Errors
    ///
    /// As for [`sign_authorization`](Self::sign_authorization), plus wallet
    /// failures classified by [`AdapterError`].
    #[tracing::instrument(skip(self), err)]
    pub async fn broadcast_direct_transfer(
        &self,
        payer: Address,
        pay_to: Address,
        amount: U256,
        network: Network,
    ) -> Result<B256, AdapterError> {
        self.connected_payer(payer)?;
        let deployment = deployment(network)?;
        let tx_hash = self
            .wallet
            .transfer_token(deployment.address, pay_to, amount)
            .await?;
        tracing::info!(%tx_hash, "transfer broadcast");
        Ok(tx_hash)
    }

    /// Polls until `tx_hash` is mined.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Chain`] if the transfer reverts or is not mined in
    /// time.
    #[tracing::instrument(skip(self), err)]
    pub async fn await_receipt(&self, tx_hash: B256) -> Result<(), AdapterError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            match self.wallet.receipt_status(tx_hash).await? {
                ReceiptStatus::Success => return Ok(()),
                ReceiptStatus::Reverted => {
                    return Err(AdapterError::Chain(format!("transaction {tx_hash} reverted")));
                }
                ReceiptStatus::Pending => {}
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::Chain(format!(
                    "timed out waiting for receipt of {tx_hash}"
                )));
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

fn deployment(network: Network) -> Result<UsdcDeployment, AdapterError> {
    UsdcDeployment::for_network(network).ok_or_else(|| {
        AdapterError::Configuration(format!("{network} is not an EVM network"))
    })
}
