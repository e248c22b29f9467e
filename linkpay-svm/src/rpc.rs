//! Solana RPC access with primary/fallback failover.

use async_trait::async_trait;
use linkpay::AdapterError;
use solana_account::Account;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use std::fmt;
use std::sync::Arc;

/// How an RPC call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailureKind {
    /// The endpoint could not serve the request: HTTP 403, rate limiting,
    /// timeouts, connection failures. Worth retrying elsewhere.
    Unreachable,
    /// The node refused a transaction because the payer lacks funds.
    InsufficientFunds,
    /// The node answered with an error about the request itself.
    Rejected,
}

/// A classified RPC failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RpcFailure {
    /// Classification.
    pub kind: RpcFailureKind,
    /// Error text from the client or node.
    pub message: String,
}

impl RpcFailure {
    /// A failure of `kind`.
    pub fn new(kind: RpcFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a failure from its text alone.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_message(&message),
            message,
        }
    }

    /// Whether another endpoint may succeed where this one failed.
    #[must_use]
    pub fn is_flaky(&self) -> bool {
        self.kind == RpcFailureKind::Unreachable
    }
}

impl From<RpcFailure> for AdapterError {
    fn from(failure: RpcFailure) -> Self {
        match failure.kind {
            RpcFailureKind::Unreachable => Self::Rpc(failure.message),
            RpcFailureKind::InsufficientFunds => Self::InsufficientFunds(failure.message),
            RpcFailureKind::Rejected => Self::Chain(failure.message),
        }
    }
}

/// Classifies an error message by the phrases RPC providers and nodes use.
#[must_use]
pub fn classify_message(message: &str) -> RpcFailureKind {
    const FLAKY: &[&str] = &[
        "403",
        "forbidden",
        "429",
        "rate limit",
        "too many requests",
        "timed out",
        "timeout",
        "connection",
        "network",
        "failed to fetch",
        "503",
        "502",
    ];
    const BROKE: &[&str] = &[
        "insufficient funds",
        "insufficient lamports",
        "custom program error: 0x1",
    ];
    let lower = message.to_ascii_lowercase();
    if BROKE.iter().any(|p| lower.contains(p)) {
        RpcFailureKind::InsufficientFunds
    } else if FLAKY.iter().any(|p| lower.contains(p)) {
        RpcFailureKind::Unreachable
    } else {
        RpcFailureKind::Rejected
    }
}

/// Classifies a `solana_client` error.
#[must_use]
pub fn classify_client_error(err: &ClientError) -> RpcFailure {
    let message = err.to_string();
    let kind = match err.kind() {
        ClientErrorKind::Io(_) => RpcFailureKind::Unreachable,
        ClientErrorKind::Reqwest(e)
            if e.is_timeout()
                || e.is_connect()
                || e.status()
                    .is_some_and(|s| matches!(s.as_u16(), 403 | 429 | 502 | 503 | 504)) =>
        {
            RpcFailureKind::Unreachable
        }
        _ => classify_message(&message),
    };
    RpcFailure { kind, message }
}

/// The RPC calls the Solana adapter makes.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Human-readable endpoint name for logs.
    fn endpoint(&self) -> String;

    /// Fetches an account; `Ok(None)` means it does not exist.
    async fn get_account(&self, pubkey: Pubkey) -> Result<Option<Account>, RpcFailure>;

    /// Latest blockhash and the last block height at which it is valid.
    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcFailure>;

    /// Submits a signed transaction.
    async fn send_transaction(&self, tx: VersionedTransaction) -> Result<Signature, RpcFailure>;

    /// Confirmation status: `None` while unknown, `Some(Err(_))` if the
    /// transaction failed on-chain.
    async fn signature_status(
        &self,
        signature: Signature,
    ) -> Result<Option<Result<(), String>>, RpcFailure>;

    /// Current block height.
    async fn block_height(&self) -> Result<u64, RpcFailure>;
}

/// [`SolanaRpc`] over a JSON-RPC HTTP endpoint.
pub struct HttpSolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl fmt::Debug for HttpSolanaRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSolanaRpc")
            .field("url", &self.client.url())
            .finish_non_exhaustive()
    }
}

impl HttpSolanaRpc {
    /// Connects to `url` at `confirmed` commitment.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_commitment(url, CommitmentConfig::confirmed())
    }

    /// Connects to `url` at the given commitment.
    #[must_use]
    pub fn with_commitment(url: impl Into<String>, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.into(), commitment),
            commitment,
        }
    }
}

#[async_trait]
impl SolanaRpc for HttpSolanaRpc {
    fn endpoint(&self) -> String {
        self.client.url()
    }

    async fn get_account(&self, pubkey: Pubkey) -> Result<Option<Account>, RpcFailure> {
        self.client
            .get_account_with_commitment(&pubkey, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| classify_client_error(&e))
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcFailure> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn send_transaction(&self, tx: VersionedTransaction) -> Result<Signature, RpcFailure> {
        self.client
            .send_transaction(&tx)
            .await
            .map_err(|e| classify_client_error(&e))
    }

    async fn signature_status(
        &self,
        signature: Signature,
    ) -> Result<Option<Result<(), String>>, RpcFailure> {
        let status = self
            .client
            .get_signature_status_with_commitment(&signature, self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))?;
        Ok(status.map(|result| result.map_err(|e| e.to_string())))
    }

    async fn block_height(&self) -> Result<u64, RpcFailure> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| classify_client_error(&e))
    }
}

/// Tries the primary endpoint first and, only when it fails with a flaky
/// error, the same call on the fallback. Never races the two.
#[derive(Clone)]
pub struct FallbackRpc {
    primary: Arc<dyn SolanaRpc>,
    fallback: Option<Arc<dyn SolanaRpc>>,
}

impl fmt::Debug for FallbackRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRpc")
            .field("primary", &self.primary.endpoint())
            .field("fallback", &self.fallback.as_ref().map(|r| r.endpoint()))
            .finish()
    }
}

impl FallbackRpc {
    /// A primary endpoint with a fallback.
    #[must_use]
    pub fn new(primary: Arc<dyn SolanaRpc>, fallback: Arc<dyn SolanaRpc>) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// A single endpoint without failover.
    #[must_use]
    pub fn single(primary: Arc<dyn SolanaRpc>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// The endpoint to retry on after `failure`, if any.
    fn retry_target(&self, op: &str, failure: &RpcFailure) -> Option<&Arc<dyn SolanaRpc>> {
        if !failure.is_flaky() {
            return None;
        }
        let fallback = self.fallback.as_ref()?;
        tracing::warn!(
            endpoint = %self.primary.endpoint(),
            fallback = %fallback.endpoint(),
            op,
            error = %failure,
            "primary RPC failed, retrying on fallback"
        );
        Some(fallback)
    }
}

#[async_trait]
impl SolanaRpc for FallbackRpc {
    fn endpoint(&self) -> String {
        self.primary.endpoint()
    }

    async fn get_account(&self, pubkey: Pubkey) -> Result<Option<Account>, RpcFailure> {
        match self.primary.get_account(pubkey).await {
            Err(e) => match self.retry_target("get_account", &e) {
                Some(fallback) => fallback.get_account(pubkey).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcFailure> {
        match self.primary.latest_blockhash().await {
            Err(e) => match self.retry_target("latest_blockhash", &e) {
                Some(fallback) => fallback.latest_blockhash().await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn send_transaction(&self, tx: VersionedTransaction) -> Result<Signature, RpcFailure> {
        match self.primary.send_transaction(tx.clone()).await {
            Err(e) => match self.retry_target("send_transaction", &e) {
                Some(fallback) => fallback.send_transaction(tx).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn signature_status(
        &self,
        signature: Signature,
    ) -> Result<Option<Result<(), String>>, RpcFailure> {
        match self.primary.signature_status(signature).await {
            Err(e) => match self.retry_target("signature_status", &e) {
                Some(fallback) => fallback.signature_status(signature).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn block_height(&self) -> Result<u64, RpcFailure> {
        match self.primary.block_height().await {
            Err(e) => match self.retry_target("block_height", &e) {
                Some(fallback) => fallback.block_height().await,
                None => Err(e),
            },
            ok => ok,
        }
    }
}
