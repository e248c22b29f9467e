//! The Solana chain adapter.

use linkpay::amount::to_base_units;
use linkpay::{AdapterError, Network};
use rust_decimal::Decimal;
use solana_message::v0::Message as MessageV0;
use solana_message::VersionedMessage;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use std::sync::Arc;
use std::time::Duration;

use crate::ata::{associated_token_address, create_associated_token_account_idempotent};
use crate::networks::UsdcMint;
use crate::rpc::SolanaRpc;
use crate::wallet::SolanaWallet;

/// Interval between confirmation checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A USDC transfer ready for signing.
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    /// The transaction; unsigned until passed through [`SolanaAdapter::sign`].
    pub transaction: VersionedTransaction,
    /// Confirmation is abandoned once the chain passes this height.
    pub last_valid_block_height: u64,
    /// Amount in USDC base units.
    pub amount: u64,
    /// Whether the transaction creates the recipient's token account.
    pub creates_recipient_account: bool,
}

/// Builds, signs, submits and confirms SPL USDC transfers.
#[derive(Clone)]
pub struct SolanaAdapter {
    wallet: Arc<dyn SolanaWallet>,
    rpc: Arc<dyn SolanaRpc>,
    poll_interval: Duration,
}

impl std::fmt::Debug for SolanaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaAdapter")
            .field("pubkey", &self.wallet.pubkey())
            .field("rpc", &self.rpc.endpoint())
            .finish_non_exhaustive()
    }
}

impl SolanaAdapter {
    /// Creates an adapter. Pass a [`FallbackRpc`](crate::rpc::FallbackRpc)
    /// as `rpc` for failover.
    #[must_use]
    pub fn new(wallet: Arc<dyn SolanaWallet>, rpc: Arc<dyn SolanaRpc>) -> Self {
        Self {
            wallet,
            rpc,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the confirmation poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The connected account.
    #[must_use]
    pub fn pubkey(&self) -> Option<Pubkey> {
        self.wallet.pubkey()
    }

    /// Builds a transfer of `amount` USDC to `recipient`.
    ///
    /// Checks the sender's balance first, and prepends a create-account
    /// instruction when the recipient has no USDC token account.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Configuration`] without a connected wallet or for a
    /// non-Solana network, [`AdapterError::InsufficientFunds`] if the balance
    /// is too low, [`AdapterError::Rpc`] if both endpoints are unreachable.
    #[tracing::instrument(skip(self), err)]
    pub async fn prepare_transfer(
        &self,
        recipient: Pubkey,
        amount: Decimal,
        network: Network,
    ) -> Result<PreparedTransfer, AdapterError> {
        let payer = self
            .wallet
            .pubkey()
            .ok_or_else(|| AdapterError::Configuration("wallet not connected".to_owned()))?;
        let usdc = UsdcMint::for_network(network).ok_or_else(|| {
            AdapterError::Configuration(format!("{network} is not a Solana network"))
        })?;
        let units = to_base_units(amount, usdc.decimals)
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let source = associated_token_address(&payer, &usdc.mint, &usdc.token_program);
        let destination = associated_token_address(&recipient, &usdc.mint, &usdc.token_program);

        self.ensure_balance(source, units).await?;

        let recipient_account = self.rpc.get_account(destination).await?;
        let creates_recipient_account = recipient_account.is_none();

        let mut instructions = Vec::with_capacity(2);
        if creates_recipient_account {
            tracing::debug!(%destination, "recipient token account missing, creating it");
            instructions.push(create_associated_token_account_idempotent(
                &payer,
                &recipient,
                &usdc.mint,
                &usdc.token_program,
            ));
        }
        instructions.push(
            spl_token::instruction::transfer_checked(
                &usdc.token_program,
                &source,
                &usdc.mint,
                &destination,
                &payer,
                &[],
                units,
                usdc.decimals,
            )
            .map_err(|e| AdapterError::Chain(e.to_string()))?,
        );

        let (blockhash, last_valid_block_height) = self.rpc.latest_blockhash().await?;
        let message = MessageV0::try_compile(&payer, &instructions, &[], blockhash)
            .map_err(|e| AdapterError::Chain(format!("{e:?}")))?;

        Ok(PreparedTransfer {
            transaction: VersionedTransaction {
                signatures: vec![],
                message: VersionedMessage::V0(message),
            },
            last_valid_block_height,
            amount: units,
            creates_recipient_account,
        })
    }

    async fn ensure_balance(&self, source: Pubkey, units: u64) -> Result<(), AdapterError> {
        let Some(account) = self.rpc.get_account(source).await? else {
            return Err(AdapterError::InsufficientFunds(
                "sender has no USDC token account".to_owned(),
            ));
        };
        let token = spl_token::state::Account::unpack(&account.data)
            .map_err(|e| AdapterError::Chain(format!("unreadable token account {source}: {e}")))?;
        if token.amount < units {
            return Err(AdapterError::InsufficientFunds(format!(
                "balance {} is below {units}",
                token.amount
            )));
        }
        Ok(())
    }

    /// Asks the wallet to sign.
    ///
    /// # Errors
    ///
    /// [`AdapterError::UserCancelled`] if the wallet owner declines.
    pub async fn sign(&self, mut prepared: PreparedTransfer) -> Result<PreparedTransfer, AdapterError> {
        prepared.transaction = self.wallet.sign_transaction(prepared.transaction).await?;
        Ok(prepared)
    }

    /// Submits a signed transfer.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Rpc`] if no endpoint accepts it,
    /// [`AdapterError::InsufficientFunds`] or [`AdapterError::Chain`] if the
    /// node refuses it.
    pub async fn submit(&self, signed: &PreparedTransfer) -> Result<Signature, AdapterError> {
        let signature = self.rpc.send_transaction(signed.transaction.clone()).await?;
        tracing::info!(%signature, "transfer submitted");
        Ok(signature)
    }

    /// Waits until `signature` is confirmed, giving up once the chain moves
    /// past `last_valid_block_height`.
    ///
    /// # Errors
    ///
    /// [`AdapterError::Chain`] if the transaction fails or expires.
    pub async fn confirm(
        &self,
        signature: Signature,
        last_valid_block_height: u64,
    ) -> Result<(), AdapterError> {
        loop {
            match self.rpc.signature_status(signature).await? {
                Some(Ok(())) => {
                    tracing::info!(%signature, "transfer confirmed");
                    return Ok(());
                }
                Some(Err(e)) => return Err(AdapterError::Chain(e)),
                None => {}
            }
            let height = self.rpc.block_height().await?;
            if height > last_valid_block_height {
                return Err(AdapterError::Chain(format!(
                    "transaction {signature} expired at block height {height} before confirmation"
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Prepares, signs, submits and confirms a transfer.
    ///
    /// # Errors
    ///
    /// Any error of the individual steps.
    pub async fn transfer(
        &self,
        recipient: Pubkey,
        amount: Decimal,
        network: Network,
    ) -> Result<Signature, AdapterError> {
        let prepared = self.prepare_transfer(recipient, amount, network).await?;
        let signed = self.sign(prepared).await?;
        let signature = self.submit(&signed).await?;
        self.confirm(signature, signed.last_valid_block_height).await?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::USDC_MINT_DEVNET;
    use crate::rpc::{FallbackRpc, RpcFailure, RpcFailureKind};
    use crate::wallet::KeypairWallet;
    use async_trait::async_trait;
    use linkpay::wallet::WalletError;
    use solana_account::Account;
    use solana_keypair::Keypair;
    use solana_message::Hash;
    use solana_signer::Signer;
    use spl_token::state::AccountState;
    use std::collections::{HashMap, VecDeque};
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockRpc {
        failure: Option<RpcFailure>,
        accounts: HashMap<Pubkey, Account>,
        statuses: Mutex<VecDeque<Option<Result<(), String>>>>,
        height: AtomicU64,
        calls: AtomicUsize,
        sent: Mutex<Vec<VersionedTransaction>>,
    }

    impl MockRpc {
        fn failing(kind: RpcFailureKind, message: &str) -> Self {
            Self {
                failure: Some(RpcFailure::new(kind, message)),
                ..Self::default()
            }
        }

        fn check(&self) -> Result<(), RpcFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.failure.clone().map_or(Ok(()), Err)
        }
    }

    #[async_trait]
    impl SolanaRpc for MockRpc {
        fn endpoint(&self) -> String {
            "mock".to_owned()
        }

        async fn get_account(&self, pubkey: Pubkey) -> Result<Option<Account>, RpcFailure> {
            self.check()?;
            Ok(self.accounts.get(&pubkey).cloned())
        }

        async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcFailure> {
            self.check()?;
            Ok((Hash::new_from_array([7; 32]), 150))
        }

        async fn send_transaction(
            &self,
            tx: VersionedTransaction,
        ) -> Result<Signature, RpcFailure> {
            self.check()?;
            let signature = tx.signatures[0];
            self.sent.lock().unwrap().push(tx);
            Ok(signature)
        }

        async fn signature_status(
            &self,
            _signature: Signature,
        ) -> Result<Option<Result<(), String>>, RpcFailure> {
            self.check()?;
            let mut statuses = self.statuses.lock().unwrap();
            Ok(if statuses.len() > 1 {
                statuses.pop_front().flatten()
            } else {
                statuses.front().cloned().flatten()
            })
        }

        async fn block_height(&self) -> Result<u64, RpcFailure> {
            self.check()?;
            Ok(100 + self.height.fetch_add(10, Ordering::SeqCst))
        }
    }

    fn token_account(owner: &Pubkey, amount: u64) -> Account {
        let mut data = vec![0u8; spl_token::state::Account::LEN];
        let state = spl_token::state::Account {
            mint: USDC_MINT_DEVNET,
            owner: *owner,
            amount,
            state: AccountState::Initialized,
            ..Default::default()
        };
        spl_token::state::Account::pack(state, &mut data).unwrap();
        Account {
            lamports: 2_039_280,
            data,
            owner: spl_token::id(),
            executable: false,
            rent_epoch: 0,
        }
    }

    fn usdc(owner: &Pubkey) -> Pubkey {
        associated_token_address(owner, &USDC_MINT_DEVNET, &spl_token::id())
    }

    /// A healthy node where `payer` holds 100 USDC and, optionally, the
    /// recipient already has a token account.
    fn healthy(payer: &Pubkey, recipient: Option<&Pubkey>) -> MockRpc {
        let mut accounts = HashMap::new();
        accounts.insert(usdc(payer), token_account(payer, 100_000_000));
        if let Some(r) = recipient {
            accounts.insert(usdc(r), token_account(r, 0));
        }
        MockRpc {
            accounts,
            statuses: Mutex::new(VecDeque::from([None, Some(Ok(()))])),
            ..MockRpc::default()
        }
    }

    fn price() -> Decimal {
        Decimal::from_str("9.99").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_completes_transfer_when_primary_is_flaky() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let recipient = Pubkey::new_from_array([9; 32]);
        let primary = Arc::new(MockRpc::failing(
            RpcFailureKind::Unreachable,
            "HTTP status client error (403 Forbidden)",
        ));
        let fallback = Arc::new(healthy(&payer, Some(&recipient)));
        let rpc = FallbackRpc::new(
            Arc::clone(&primary) as Arc<dyn SolanaRpc>,
            Arc::clone(&fallback) as Arc<dyn SolanaRpc>,
        );
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));

        let signature = adapter
            .transfer(recipient, price(), Network::SolanaDevnet)
            .await
            .unwrap();

        assert!(primary.calls.load(Ordering::SeqCst) > 0);
        let sent = fallback.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].signatures[0], signature);
    }

    #[tokio::test]
    async fn non_flaky_errors_skip_fallback() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let primary = Arc::new(MockRpc::failing(RpcFailureKind::Rejected, "invalid param"));
        let fallback = Arc::new(healthy(&payer, None));
        let rpc = FallbackRpc::new(primary, Arc::clone(&fallback) as Arc<dyn SolanaRpc>);
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));

        let err = adapter
            .prepare_transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Chain(_)));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_everywhere_is_rpc_error() {
        let keypair = Keypair::new();
        let rpc = FallbackRpc::new(
            Arc::new(MockRpc::failing(RpcFailureKind::Unreachable, "429")),
            Arc::new(MockRpc::failing(RpcFailureKind::Unreachable, "timed out")),
        );
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));
        let err = adapter
            .prepare_transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert!(err.is_rpc());
    }

    #[tokio::test]
    async fn missing_recipient_account_is_created() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let recipient = Pubkey::new_from_array([9; 32]);
        let rpc = Arc::new(healthy(&payer, None));
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), rpc);

        let prepared = adapter
            .prepare_transfer(recipient, price(), Network::SolanaDevnet)
            .await
            .unwrap();
        assert!(prepared.creates_recipient_account);
        assert_eq!(prepared.amount, 9_990_000);
        let message = &prepared.transaction.message;
        assert_eq!(message.instructions().len(), 2);
        let first_program = message.instructions()[0].program_id(message.static_account_keys());
        assert_eq!(*first_program, crate::ata::ATA_PROGRAM_PUBKEY);
        let second_program = message.instructions()[1].program_id(message.static_account_keys());
        assert_eq!(*second_program, spl_token::id());
    }

    #[tokio::test]
    async fn existing_recipient_account_is_reused() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let recipient = Pubkey::new_from_array([9; 32]);
        let rpc = Arc::new(healthy(&payer, Some(&recipient)));
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), rpc);

        let prepared = adapter
            .prepare_transfer(recipient, price(), Network::SolanaDevnet)
            .await
            .unwrap();
        assert!(!prepared.creates_recipient_account);
        assert_eq!(prepared.transaction.message.instructions().len(), 1);
    }

    #[tokio::test]
    async fn low_balance_fails_before_signing() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let mut rpc = healthy(&payer, None);
        rpc.accounts.insert(usdc(&payer), token_account(&payer, 1_000));
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));

        let err = adapter
            .transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InsufficientFunds(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_stops_at_blockhash_expiry() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let rpc = healthy(&payer, None);
        *rpc.statuses.lock().unwrap() = VecDeque::from([None]);
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));

        let err = adapter
            .transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Chain(msg) if msg.contains("expired")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_transaction_is_chain_error() {
        let keypair = Keypair::new();
        let payer = keypair.pubkey();
        let rpc = healthy(&payer, None);
        *rpc.statuses.lock().unwrap() =
            VecDeque::from([Some(Err("InstructionError(1, Custom(1))".to_owned()))]);
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc));

        let err = adapter
            .transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Chain(_)));
    }

    struct RejectingWallet(Pubkey);

    #[async_trait]
    impl SolanaWallet for RejectingWallet {
        fn pubkey(&self) -> Option<Pubkey> {
            Some(self.0)
        }

        async fn sign_transaction(
            &self,
            _tx: VersionedTransaction,
        ) -> Result<VersionedTransaction, WalletError> {
            Err(WalletError::Rejected("User rejected the request.".into()))
        }
    }

    #[tokio::test]
    async fn declined_signature_is_user_cancelled() {
        let payer = Pubkey::new_from_array([5; 32]);
        let rpc = Arc::new(healthy(&payer, None));
        let adapter = SolanaAdapter::new(Arc::new(RejectingWallet(payer)), rpc);
        let err = adapter
            .transfer(Pubkey::new_from_array([9; 32]), price(), Network::SolanaDevnet)
            .await
            .unwrap_err();
        assert_eq!(err, AdapterError::UserCancelled);
    }

    #[tokio::test]
    async fn evm_network_is_configuration_error() {
        let keypair = Keypair::new();
        let rpc = Arc::new(MockRpc::default());
        let adapter = SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), rpc);
        let err = adapter
            .prepare_transfer(Pubkey::new_from_array([9; 32]), price(), Network::Base)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Configuration(_)));
    }
}
