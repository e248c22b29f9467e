//! The Solana wallet seam.

use async_trait::async_trait;
use linkpay::wallet::WalletError;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;

/// What the Solana adapter needs from a connected wallet.
#[async_trait]
pub trait SolanaWallet: Send + Sync {
    /// The connected account, if any.
    fn pubkey(&self) -> Option<Pubkey>;

    /// Adds the wallet's signature to `tx`.
    async fn sign_transaction(
        &self,
        tx: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError>;
}

/// A [`SolanaWallet`] holding its own keypair.
#[derive(Debug)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    /// Wraps `keypair`.
    #[must_use]
    pub const fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Parses a base58-encoded 64-byte secret key.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Failed`] if the key is malformed.
    pub fn from_base58(secret: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| WalletError::Failed(format!("invalid keypair: {e}")))?;
        Keypair::try_from(bytes.as_slice())
            .map(Self::new)
            .map_err(|e| WalletError::Failed(format!("invalid keypair: {e}")))
    }
}

/// Places `signer`'s signature at its slot among the required signers.
///
/// # Errors
///
/// Returns [`WalletError::Failed`] if `signer` is not a required signer.
pub fn sign_with_keypair<S: Signer>(
    mut tx: VersionedTransaction,
    signer: &S,
) -> Result<VersionedTransaction, WalletError> {
    let signature = signer
        .try_sign_message(&tx.message.serialize())
        .map_err(|e| WalletError::Failed(e.to_string()))?;
    let num_required = usize::from(tx.message.header().num_required_signatures);
    let position = tx.message.static_account_keys()[..num_required]
        .iter()
        .position(|k| *k == signer.pubkey())
        .ok_or_else(|| WalletError::Failed("signer is not a required signer".to_owned()))?;
    if tx.signatures.len() < num_required {
        tx.signatures.resize(num_required, Signature::default());
    }
    tx.signatures[position] = signature;
    Ok(tx)
}

#[async_trait]
impl SolanaWallet for KeypairWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(
        &self,
        tx: VersionedTransaction,
    ) -> Result<VersionedTransaction, WalletError> {
        sign_with_keypair(tx, &self.keypair)
    }
}
