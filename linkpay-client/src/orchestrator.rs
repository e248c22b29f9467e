//! The buyer-side payment state machine.

use alloy_primitives::{Address, U256};
use linkpay::amount::to_base_units;
use linkpay::network::USDC_DECIMALS;
use linkpay::settlement::DirectPaymentRequest;
use linkpay::{AdapterError, ChainFamily, Network, Settlement};
use linkpay_evm::EvmAdapter;
use linkpay_svm::SolanaAdapter;
use rust_decimal::Decimal;
use solana_pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::watch;

use crate::settlement_api::{SettlementApi, SettlementApiError};
use crate::state::PaymentState;

/// How an EVM payment moves funds. Solana payments are always direct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Sign an x402 authorization; no gas, nothing sent on-chain by the buyer.
    #[default]
    X402,
    /// Send a USDC transfer from the buyer's wallet and report its hash.
    Direct,
}

/// One purchase to pay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Product being bought.
    pub product_id: String,
    /// Creator address receiving the funds.
    pub pay_to: String,
    /// Price in USDC.
    pub price: Decimal,
    /// Network to pay on.
    pub network: Network,
    /// EVM payment method.
    pub method: PaymentMethod,
}

/// Why [`PaymentOrchestrator::pay`] did not complete.
#[derive(Debug, thiserror::Error)]
pub enum PayError {
    /// Another attempt is in flight.
    #[error("a payment is already in progress")]
    Busy,
    /// The chain adapter failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// The settlement server refused or could not be reached.
    #[error(transparent)]
    Settlement(#[from] SettlementApiError),
    /// No adapter is configured for the requested network.
    #[error("no wallet configured for {0}")]
    UnsupportedNetwork(Network),
}

impl PayError {
    /// The message shown to the buyer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy => "A payment is already in progress.".to_owned(),
            Self::Adapter(e) => e.user_message(),
            Self::Settlement(e) => e.user_message(),
            Self::UnsupportedNetwork(network) => format!("Paying on {network} is not supported."),
        }
    }
}

/// Runs payment attempts one at a time and publishes their progress.
pub struct PaymentOrchestrator {
    evm: Option<EvmAdapter>,
    solana: Option<SolanaAdapter>,
    api: Arc<dyn SettlementApi>,
    state: watch::Sender<PaymentState>,
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field("evm", &self.evm)
            .field("solana", &self.solana)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl PaymentOrchestrator {
    /// An orchestrator without any wallet.
    #[must_use]
    pub fn new(api: Arc<dyn SettlementApi>) -> Self {
        Self {
            evm: None,
            solana: None,
            api,
            state: watch::Sender::new(PaymentState::Idle),
        }
    }

    /// Enables payments on EVM networks.
    #[must_use]
    pub fn with_evm(mut self, adapter: EvmAdapter) -> Self {
        self.evm = Some(adapter);
        self
    }

    /// Enables payments on Solana networks.
    #[must_use]
    pub fn with_solana(mut self, adapter: SolanaAdapter) -> Self {
        self.solana = Some(adapter);
        self
    }

    /// Whether a wallet is configured for `network`.
    #[must_use]
    pub const fn supports(&self, network: Network) -> bool {
        match network.family() {
            ChainFamily::Evm => self.evm.is_some(),
            ChainFamily::Solana => self.solana.is_some(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> PaymentState {
        self.state.borrow().clone()
    }

    /// Follows state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.state.subscribe()
    }

    /// Returns a finished attempt to [`PaymentState::Idle`].
    ///
    /// # Errors
    ///
    /// [`PayError::Busy`] while an attempt is in flight.
    pub fn reset(&self) -> Result<(), PayError> {
        let mut busy = false;
        self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                busy = true;
                false
            } else {
                let changed = *state != PaymentState::Idle;
                *state = PaymentState::Idle;
                changed
            }
        });
        if busy { Err(PayError::Busy) } else { Ok(()) }
    }

    /// Pays for a product and unlocks it.
    ///
    /// Only starts from [`PaymentState::Idle`]; call [`reset`](Self::reset)
    /// after a finished attempt. The attempt ends in
    /// [`PaymentState::Success`] or [`PaymentState::Error`], including when
    /// the returned future is dropped before completing.
    ///
    /// # Errors
    ///
    /// [`PayError::Busy`] if not idle (the state is left untouched);
    /// otherwise whatever ended the attempt.
    #[tracing::instrument(skip(self), fields(product_id = %request.product_id, network = %request.network), err)]
    pub async fn pay(&self, request: PaymentRequest) -> Result<Settlement, PayError> {
        let started = self.state.send_if_modified(|state| {
            if *state == PaymentState::Idle {
                *state = PaymentState::Signing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(PayError::Busy);
        }

        let guard = AttemptGuard { state: &self.state };
        match self.attempt(&request).await {
            Ok(settlement) => {
                tracing::info!(reference = %settlement.tx_hash, "payment settled");
                guard.finish(PaymentState::Success {
                    reference: settlement.tx_hash.clone(),
                    unlocked_content: settlement.unlocked_content.clone(),
                });
                Ok(settlement)
            }
            Err(e) => {
                tracing::warn!(error = %e, "payment failed");
                guard.finish(PaymentState::Error {
                    message: e.user_message(),
                });
                Err(e)
            }
        }
    }

    fn enter(&self, next: PaymentState) {
        self.state.send_replace(next);
    }

    async fn attempt(&self, request: &PaymentRequest) -> Result<Settlement, PayError> {
        match request.network.family() {
            ChainFamily::Evm => {
                let adapter = self
                    .evm
                    .as_ref()
                    .ok_or(PayError::UnsupportedNetwork(request.network))?;
                match request.method {
                    PaymentMethod::X402 => self.pay_x402(adapter, request).await,
                    PaymentMethod::Direct => self.pay_evm_direct(adapter, request).await,
                }
            }
            ChainFamily::Solana => {
                let adapter = self
                    .solana
                    .as_ref()
                    .ok_or(PayError::UnsupportedNetwork(request.network))?;
                self.pay_solana(adapter, request).await
            }
        }
    }

    async fn pay_x402(
        &self,
        adapter: &EvmAdapter,
        request: &PaymentRequest,
    ) -> Result<Settlement, PayError> {
        let (payer, pay_to, amount) = evm_transfer(adapter, request)?;
        let signed = adapter
            .sign_authorization(payer, pay_to, amount, request.network)
            .await?;

        self.enter(PaymentState::Submitting);
        let header = signed.encode().map_err(AdapterError::from)?;

        self.enter(PaymentState::Verifying);
        Ok(self
            .api
            .verify_x402(&request.product_id, &header, &payer.to_string())
            .await?)
    }

    async fn pay_evm_direct(
        &self,
        adapter: &EvmAdapter,
        request: &PaymentRequest,
    ) -> Result<Settlement, PayError> {
        let (payer, pay_to, amount) = evm_transfer(adapter, request)?;
        // The wallet signs and broadcasts in one step.
        let tx_hash = adapter
            .broadcast_direct_transfer(payer, pay_to, amount, request.network)
            .await?;

        self.enter(PaymentState::Submitting);
        adapter.await_receipt(tx_hash).await?;

        self.enter(PaymentState::Verifying);
        Ok(self
            .api
            .verify_direct(&DirectPaymentRequest {
                product_id: request.product_id.clone(),
                tx_hash: tx_hash.to_string(),
                network: request.network.ledger_name().to_owned(),
                buyer_address: payer.to_string(),
            })
            .await?)
    }

    async fn pay_solana(
        &self,
        adapter: &SolanaAdapter,
        request: &PaymentRequest,
    ) -> Result<Settlement, PayError> {
        let buyer = adapter
            .pubkey()
            .ok_or_else(|| AdapterError::Configuration("wallet not connected".to_owned()))?;
        let recipient: Pubkey = request.pay_to.trim().parse().map_err(|_| {
            AdapterError::Configuration(format!("{} is not a Solana address", request.pay_to))
        })?;
        let prepared = adapter
            .prepare_transfer(recipient, request.price, request.network)
            .await?;
        let signed = adapter.sign(prepared).await?;

        self.enter(PaymentState::Submitting);
        let signature = adapter.submit(&signed).await?;

        self.enter(PaymentState::Verifying);
        adapter
            .confirm(signature, signed.last_valid_block_height)
            .await?;
        Ok(self
            .api
            .verify_direct(&DirectPaymentRequest {
                product_id: request.product_id.clone(),
                tx_hash: signature.to_string(),
                network: request.network.ledger_name().to_owned(),
                buyer_address: buyer.to_string(),
            })
            .await?)
    }
}

/// Shown when an attempt is dropped before it finished.
pub const INTERRUPTED_MESSAGE: &str = "Payment was interrupted.";

/// Ends an attempt. Dropping it unfinished moves an in-flight state to
/// [`PaymentState::Error`] so the next [`PaymentOrchestrator::pay`] is not
/// refused as busy.
struct AttemptGuard<'a> {
    state: &'a watch::Sender<PaymentState>,
}

impl AttemptGuard<'_> {
    fn finish(self, outcome: PaymentState) {
        self.state.send_replace(outcome);
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let interrupted = self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                *state = PaymentState::Error {
                    message: INTERRUPTED_MESSAGE.to_owned(),
                };
                true
            } else {
                false
            }
        });
        if interrupted {
            tracing::warn!("payment attempt dropped before finishing");
        }
    }
}

fn evm_transfer(
    adapter: &EvmAdapter,
    request: &PaymentRequest,
) -> Result<(Address, Address, U256), AdapterError> {
    let payer = adapter
        .address()
        .ok_or_else(|| AdapterError::Configuration("wallet not connected".to_owned()))?;
    let pay_to: Address = request.pay_to.trim().parse().map_err(|_| {
        AdapterError::Configuration(format!("{} is not an EVM address", request.pay_to))
    })?;
    let units = to_base_units(request.price, USDC_DECIMALS)
        .map_err(|e| AdapterError::Protocol(e.to_string()))?;
    Ok((payer, pay_to, U256::from(units)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, Signature};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use linkpay::proto::decode_payment_payload;
    use linkpay::settlement::ErrorReason;
    use linkpay::wallet::WalletError;
    use linkpay_evm::wallet::{EvmWallet, ReceiptStatus};
    use linkpay_svm::{KeypairWallet, RpcFailure, SolanaRpc};
    use reqwest::StatusCode;
    use solana_account::Account;
    use solana_keypair::Keypair;
    use solana_message::Hash;
    use solana_signature::Signature as SolanaSignature;
    use solana_signer::Signer;
    use solana_transaction::versioned::VersionedTransaction;
    use spl_token::solana_program::program_pack::Pack;
    use spl_token::state::AccountState;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const CREATOR: &str = "0x2222222222222222222222222222222222222222";
    const TARGET: &str = "https://example.com/secret.pdf";

    /// Records what the server was sent and answers with a fixed outcome.
    #[derive(Default)]
    struct MockApi {
        reject: Option<ErrorReason>,
        x402: Mutex<Vec<(String, String, String)>>,
        direct: Mutex<Vec<DirectPaymentRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockApi {
        async fn answer(&self, reference: String) -> Result<Settlement, SettlementApiError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.reject {
                Some(reason) => Err(SettlementApiError::Rejected {
                    status: StatusCode::CONFLICT,
                    reason,
                    message: format!("rejected: {reason}"),
                }),
                None => Ok(Settlement {
                    tx_hash: reference,
                    unlocked_content: TARGET.to_owned(),
                }),
            }
        }
    }

    #[async_trait]
    impl SettlementApi for MockApi {
        async fn verify_x402(
            &self,
            product_id: &str,
            payment_header: &str,
            buyer_address: &str,
        ) -> Result<Settlement, SettlementApiError> {
            self.x402.lock().unwrap().push((
                product_id.to_owned(),
                payment_header.to_owned(),
                buyer_address.to_owned(),
            ));
            self.answer("0xreference".to_owned()).await
        }

        async fn verify_direct(
            &self,
            request: &DirectPaymentRequest,
        ) -> Result<Settlement, SettlementApiError> {
            self.direct.lock().unwrap().push(request.clone());
            self.answer(request.tx_hash.clone()).await
        }
    }

    struct MockEvmWallet {
        signer: PrivateKeySigner,
        reject: bool,
        receipt_gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl EvmWallet for MockEvmWallet {
        fn address(&self) -> Option<Address> {
            Some(self.signer.address())
        }

        async fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError> {
            if self.reject {
                return Err(WalletError::Rejected("user rejected the request".into()));
            }
            self.signer
                .sign_hash_sync(hash)
                .map_err(|e| WalletError::Failed(e.to_string()))
        }

        async fn transfer_token(
            &self,
            _token: Address,
            _to: Address,
            _amount: U256,
        ) -> Result<B256, WalletError> {
            Ok(B256::repeat_byte(0xab))
        }

        async fn receipt_status(&self, _tx_hash: B256) -> Result<ReceiptStatus, WalletError> {
            if let Some(gate) = &self.receipt_gate {
                gate.notified().await;
            }
            Ok(ReceiptStatus::Success)
        }
    }

    fn evm(reject: bool) -> EvmAdapter {
        EvmAdapter::new(Arc::new(MockEvmWallet {
            signer: PrivateKeySigner::random(),
            reject,
            receipt_gate: None,
        }))
    }

    fn request(network: Network, method: PaymentMethod, pay_to: &str) -> PaymentRequest {
        PaymentRequest {
            product_id: "P1".to_owned(),
            pay_to: pay_to.to_owned(),
            price: Decimal::from_str("9.99").unwrap(),
            network,
            method,
        }
    }

    /// Collects every state published while `fut` runs.
    async fn states_during<F: Future>(
        orchestrator: &PaymentOrchestrator,
        fut: F,
    ) -> (F::Output, Vec<PaymentState>) {
        let mut rx = orchestrator.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let done = state.is_terminal();
                sink.lock().unwrap().push(state);
                if done {
                    break;
                }
            }
        });
        let output = fut.await;
        watcher.await.unwrap();
        let seen = seen.lock().unwrap().clone();
        (output, seen)
    }

    #[tokio::test]
    async fn x402_payment_signs_and_verifies() {
        let api = Arc::new(MockApi::default());
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_evm(evm(false));
        let payer = orchestrator.evm.as_ref().unwrap().address().unwrap();

        let settlement = orchestrator
            .pay(request(Network::Base, PaymentMethod::X402, CREATOR))
            .await
            .unwrap();
        assert_eq!(settlement.unlocked_content, TARGET);
        assert_eq!(
            orchestrator.state(),
            PaymentState::Success {
                reference: "0xreference".into(),
                unlocked_content: TARGET.into(),
            }
        );

        let sent = api.x402.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        let (product_id, header, buyer) = &sent[0];
        assert_eq!(product_id, "P1");
        assert_eq!(buyer, &payer.to_string());
        let payload = decode_payment_payload(header).unwrap();
        assert_eq!(payload.network, "eip155:8453");
        assert_eq!(payload.payload.authorization.value, "9990000");
        assert_eq!(
            payload.payload.authorization.to.to_lowercase(),
            CREATOR.to_lowercase()
        );
    }

    #[tokio::test]
    async fn x402_states_progress_in_order() {
        let api = Arc::new(MockApi::default());
        let orchestrator =
            PaymentOrchestrator::new(api as Arc<dyn SettlementApi>).with_evm(evm(false));
        let (result, states) = states_during(
            &orchestrator,
            orchestrator.pay(request(Network::Base, PaymentMethod::X402, CREATOR)),
        )
        .await;
        result.unwrap();
        // A watch receiver may skip intermediate values, but never reorders them.
        let order = |s: &PaymentState| match s {
            PaymentState::Idle => 0,
            PaymentState::Signing => 1,
            PaymentState::Submitting => 2,
            PaymentState::Verifying => 3,
            PaymentState::Success { .. } | PaymentState::Error { .. } => 4,
        };
        assert!(states.windows(2).all(|w| order(&w[0]) < order(&w[1])), "{states:?}");
        assert!(matches!(states.last(), Some(PaymentState::Success { .. })));
    }

    #[tokio::test]
    async fn evm_direct_reports_transaction_hash() {
        let api = Arc::new(MockApi::default());
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_evm(evm(false));
        let settlement = orchestrator
            .pay(request(Network::Base, PaymentMethod::Direct, CREATOR))
            .await
            .unwrap();
        let expected_hash = B256::repeat_byte(0xab).to_string();
        assert_eq!(settlement.tx_hash, expected_hash);
        let direct = api.direct.lock().unwrap().clone();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].network, "base");
        assert_eq!(direct[0].tx_hash, expected_hash);
        assert!(api.x402.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn evm_direct_is_submitting_until_mined() {
        let receipt_gate = Arc::new(Notify::new());
        let api = Arc::new(MockApi::default());
        let orchestrator = Arc::new(
            PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>).with_evm(
                EvmAdapter::new(Arc::new(MockEvmWallet {
                    signer: PrivateKeySigner::random(),
                    reject: false,
                    receipt_gate: Some(Arc::clone(&receipt_gate)),
                })),
            ),
        );

        let mut rx = orchestrator.subscribe();
        let paying = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                orchestrator
                    .pay(request(Network::Base, PaymentMethod::Direct, CREATOR))
                    .await
            }
        });
        rx.wait_for(|s| *s == PaymentState::Submitting).await.unwrap();
        assert!(api.direct.lock().unwrap().is_empty());

        receipt_gate.notify_one();
        paying.await.unwrap().unwrap();
        assert_eq!(api.direct.lock().unwrap().len(), 1);
        assert!(matches!(orchestrator.state(), PaymentState::Success { .. }));
    }

    #[tokio::test]
    async fn declined_signature_ends_in_cancelled_error() {
        let api = Arc::new(MockApi::default());
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_evm(evm(true));
        let err = orchestrator
            .pay(request(Network::Base, PaymentMethod::X402, CREATOR))
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Adapter(AdapterError::UserCancelled)));
        assert_eq!(
            orchestrator.state(),
            PaymentState::Error {
                message: "Transaction was cancelled.".into()
            }
        );
        assert!(api.x402.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ledger_rejection_surfaces_server_reason() {
        let api = Arc::new(MockApi {
            reject: Some(ErrorReason::SoldOut),
            ..MockApi::default()
        });
        let orchestrator =
            PaymentOrchestrator::new(api as Arc<dyn SettlementApi>).with_evm(evm(false));
        let err = orchestrator
            .pay(request(Network::Base, PaymentMethod::X402, CREATOR))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PayError::Settlement(SettlementApiError::Rejected {
                reason: ErrorReason::SoldOut,
                ..
            })
        ));
        assert_eq!(
            orchestrator.state(),
            PaymentState::Error {
                message: "rejected: sold_out".into()
            }
        );
    }

    #[tokio::test]
    async fn finished_attempt_requires_reset() {
        let api = Arc::new(MockApi::default());
        let orchestrator =
            PaymentOrchestrator::new(api as Arc<dyn SettlementApi>).with_evm(evm(false));
        let req = request(Network::Base, PaymentMethod::X402, CREATOR);
        orchestrator.pay(req.clone()).await.unwrap();

        let again = orchestrator.pay(req.clone()).await;
        assert!(matches!(again, Err(PayError::Busy)));
        assert!(matches!(orchestrator.state(), PaymentState::Success { .. }));

        orchestrator.reset().unwrap();
        assert_eq!(orchestrator.state(), PaymentState::Idle);
        orchestrator.pay(req).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_pay_is_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::default()
        });
        let orchestrator = Arc::new(
            PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
                .with_evm(evm(false)),
        );
        let req = request(Network::Base, PaymentMethod::X402, CREATOR);

        let mut rx = orchestrator.subscribe();
        let first = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            let req = req.clone();
            async move { orchestrator.pay(req).await }
        });
        rx.wait_for(|s| *s == PaymentState::Verifying).await.unwrap();

        assert!(matches!(orchestrator.pay(req).await, Err(PayError::Busy)));
        assert!(matches!(orchestrator.reset(), Err(PayError::Busy)));
        assert_eq!(orchestrator.state(), PaymentState::Verifying);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(api.x402.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_attempt_is_interrupted_and_can_be_retried() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(MockApi {
            gate: Some(Arc::clone(&gate)),
            ..MockApi::default()
        });
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_evm(evm(false));
        let req = request(Network::Base, PaymentMethod::X402, CREATOR);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), orchestrator.pay(req.clone())).await;
        assert!(abandoned.is_err());
        assert_eq!(
            orchestrator.state(),
            PaymentState::Error {
                message: INTERRUPTED_MESSAGE.into()
            }
        );

        orchestrator.reset().unwrap();
        gate.notify_one();
        orchestrator.pay(req).await.unwrap();
        assert!(matches!(orchestrator.state(), PaymentState::Success { .. }));
        assert_eq!(api.x402.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_adapter_is_unsupported_network() {
        let api = Arc::new(MockApi::default());
        let orchestrator = PaymentOrchestrator::new(api as Arc<dyn SettlementApi>);
        let err = orchestrator
            .pay(request(Network::Solana, PaymentMethod::X402, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::UnsupportedNetwork(Network::Solana)));
        assert!(matches!(orchestrator.state(), PaymentState::Error { .. }));
    }

    #[tokio::test]
    async fn bad_payee_is_configuration_error() {
        let api = Arc::new(MockApi::default());
        let orchestrator =
            PaymentOrchestrator::new(api as Arc<dyn SettlementApi>).with_evm(evm(false));
        let err = orchestrator
            .pay(request(Network::Base, PaymentMethod::X402, "not-an-address"))
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Adapter(AdapterError::Configuration(_))));
    }

    /// A Solana node holding one funded token account, confirming on first poll.
    struct MockSolanaRpc {
        accounts: Vec<(Pubkey, Account)>,
        fail_send: bool,
    }

    #[async_trait]
    impl SolanaRpc for MockSolanaRpc {
        fn endpoint(&self) -> String {
            "mock://solana".to_owned()
        }

        async fn get_account(&self, pubkey: Pubkey) -> Result<Option<Account>, RpcFailure> {
            Ok(self
                .accounts
                .iter()
                .find(|(key, _)| *key == pubkey)
                .map(|(_, account)| account.clone()))
        }

        async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcFailure> {
            Ok((Hash::new_from_array([7; 32]), 1_000))
        }

        async fn send_transaction(
            &self,
            tx: VersionedTransaction,
        ) -> Result<SolanaSignature, RpcFailure> {
            if self.fail_send {
                return Err(RpcFailure::from_message("connection refused"));
            }
            Ok(tx.signatures[0])
        }

        async fn signature_status(
            &self,
            _signature: SolanaSignature,
        ) -> Result<Option<Result<(), String>>, RpcFailure> {
            Ok(Some(Ok(())))
        }

        async fn block_height(&self) -> Result<u64, RpcFailure> {
            Ok(10)
        }
    }

    fn solana_adapter(fail_send: bool) -> SolanaAdapter {
        let keypair = Keypair::new();
        let owner = keypair.pubkey();
        let usdc = linkpay_svm::networks::UsdcMint::for_network(Network::Solana).unwrap();
        let source = linkpay_svm::ata::associated_token_address(
            &owner,
            &usdc.mint,
            &usdc.token_program,
        );
        let token = spl_token::state::Account {
            mint: usdc.mint,
            owner,
            amount: 100_000_000,
            state: AccountState::Initialized,
            ..spl_token::state::Account::default()
        };
        let mut data = vec![0; spl_token::state::Account::LEN];
        spl_token::state::Account::pack(token, &mut data).unwrap();
        let account = Account {
            lamports: 2_039_280,
            data,
            owner: usdc.token_program,
            executable: false,
            rent_epoch: 0,
        };
        let rpc = MockSolanaRpc {
            accounts: vec![(source, account)],
            fail_send,
        };
        SolanaAdapter::new(Arc::new(KeypairWallet::new(keypair)), Arc::new(rpc))
            .with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn solana_payment_confirms_then_reports_signature() {
        let api = Arc::new(MockApi::default());
        let adapter = solana_adapter(false);
        let buyer = adapter.pubkey().unwrap();
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_solana(adapter);
        let creator = Pubkey::new_from_array([9; 32]).to_string();

        let settlement = orchestrator
            .pay(request(Network::Solana, PaymentMethod::X402, &creator))
            .await
            .unwrap();
        let direct = api.direct.lock().unwrap().clone();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].network, "solana");
        assert_eq!(direct[0].buyer_address, buyer.to_string());
        assert_eq!(direct[0].tx_hash, settlement.tx_hash);
        assert!(matches!(orchestrator.state(), PaymentState::Success { .. }));
    }

    #[tokio::test]
    async fn solana_rpc_outage_is_retryable_error() {
        let api = Arc::new(MockApi::default());
        let orchestrator = PaymentOrchestrator::new(Arc::clone(&api) as Arc<dyn SettlementApi>)
            .with_solana(solana_adapter(true));
        let creator = Pubkey::new_from_array([9; 32]).to_string();
        let err = orchestrator
            .pay(request(Network::Solana, PaymentMethod::X402, &creator))
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::Adapter(ref e) if e.is_rpc()), "{err:?}");
        assert_eq!(
            orchestrator.state(),
            PaymentState::Error {
                message: "The network is busy right now. Please try again in a moment.".into()
            }
        );
        assert!(api.direct.lock().unwrap().is_empty());
    }
}
