//! Buyer-side configuration.
//!
//! ```toml
//! ledger_url = "https://linkpay.example/"
//! request_timeout_secs = 30
//! solana_rpc_url = "https://api.mainnet-beta.solana.com"
//! solana_fallback_rpc_url = "https://solana-rpc.publicnode.com"
//! confirmation_poll_ms = 500
//!
//! [[wallets]]
//! name = "MetaMask"
//! family = "evm_injected"
//!
//! [[wallets]]
//! name = "Phantom"
//! family = "solana"
//! ```

use linkpay::ChainFamily;
use linkpay::wallet::{WalletDescriptor, WalletFamily};
use linkpay_evm::{EvmAdapter, EvmWallet};
use linkpay_svm::{FallbackRpc, HttpSolanaRpc, SolanaAdapter, SolanaRpc, SolanaWallet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::orchestrator::PaymentOrchestrator;
use crate::settlement_api::{HttpSettlementApi, SettlementApi};

/// An opened connection to one of the configured wallets.
#[derive(Clone)]
pub enum WalletConnection {
    /// An EVM account.
    Evm(Arc<dyn EvmWallet>),
    /// A Solana account.
    Solana(Arc<dyn SolanaWallet>),
}

impl WalletConnection {
    /// Chain family the connection signs for.
    #[must_use]
    pub const fn chain_family(&self) -> ChainFamily {
        match self {
            Self::Evm(_) => ChainFamily::Evm,
            Self::Solana(_) => ChainFamily::Solana,
        }
    }
}

impl std::fmt::Debug for WalletConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evm(wallet) => f.debug_tuple("Evm").field(&wallet.address()).finish(),
            Self::Solana(wallet) => f.debug_tuple("Solana").field(&wallet.pubkey()).finish(),
        }
    }
}

/// Why [`ClientConfig::orchestrator`] refused a wallet connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WalletSetupError {
    /// No configured wallet has this name.
    #[error("wallet {0:?} is not configured")]
    Unknown(String),
    /// The connection signs for a different chain than the wallet's family.
    #[error("wallet {name:?} is a {family:?} wallet but the connection is for {connected:?}")]
    FamilyMismatch {
        /// Configured wallet name.
        name: String,
        /// Configured family.
        family: WalletFamily,
        /// Chain family of the connection.
        connected: ChainFamily,
    },
    /// Two connections were given for the same chain family.
    #[error("wallet {name:?} connects {family:?}, which already has a wallet")]
    Duplicate {
        /// The second wallet's name.
        name: String,
        /// The contested chain family.
        family: ChainFamily,
    },
}

/// Where the client sends payments and how patiently it waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the settlement server.
    pub ledger_url: Url,

    /// Timeout for each settlement request (default: 30 seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Primary Solana RPC endpoint.
    #[serde(default = "default_solana_rpc_url")]
    pub solana_rpc_url: String,

    /// Endpoint tried when the primary fails transiently.
    #[serde(default)]
    pub solana_fallback_rpc_url: Option<String>,

    /// Interval between confirmation polls (default: 500 ms).
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,

    /// Wallets offered to the buyer.
    #[serde(default)]
    pub wallets: Vec<WalletDescriptor>,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_solana_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_owned()
}

const fn default_confirmation_poll_ms() -> u64 {
    500
}

impl ClientConfig {
    /// Defaults for everything but the server URL.
    #[must_use]
    pub fn new(ledger_url: Url) -> Self {
        Self {
            ledger_url,
            request_timeout_secs: default_request_timeout_secs(),
            solana_rpc_url: default_solana_rpc_url(),
            solana_fallback_rpc_url: None,
            confirmation_poll_ms: default_confirmation_poll_ms(),
            wallets: Vec::new(),
        }
    }

    /// Timeout for settlement requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Interval between confirmation polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }

    /// The settlement server client.
    #[must_use]
    pub fn settlement_api(&self) -> HttpSettlementApi {
        HttpSettlementApi::new(self.ledger_url.clone()).with_timeout(self.request_timeout())
    }

    /// The Solana RPC, with failover when a fallback endpoint is set.
    #[must_use]
    pub fn solana_rpc(&self) -> FallbackRpc {
        let primary: Arc<dyn SolanaRpc> = Arc::new(HttpSolanaRpc::new(&self.solana_rpc_url));
        match &self.solana_fallback_rpc_url {
            Some(url) => FallbackRpc::new(primary, Arc::new(HttpSolanaRpc::new(url))),
            None => FallbackRpc::single(primary),
        }
    }

    /// A Solana adapter for `wallet` using this configuration's RPC.
    #[must_use]
    pub fn solana_adapter(&self, wallet: Arc<dyn SolanaWallet>) -> SolanaAdapter {
        SolanaAdapter::new(wallet, Arc::new(self.solana_rpc()))
            .with_poll_interval(self.poll_interval())
    }

    /// The configured wallet named `name`.
    #[must_use]
    pub fn wallet(&self, name: &str) -> Option<&WalletDescriptor> {
        self.wallets.iter().find(|w| w.name == name)
    }

    /// Builds an orchestrator paying through the given connections, each
    /// keyed by the name of a configured wallet. At most one connection per
    /// chain family.
    ///
    /// # Errors
    ///
    /// [`WalletSetupError`] if a name is not configured, a connection does not
    /// match its wallet's family, or a chain family is connected twice.
    pub fn orchestrator(
        &self,
        api: Arc<dyn SettlementApi>,
        connections: impl IntoIterator<Item = (String, WalletConnection)>,
    ) -> Result<PaymentOrchestrator, WalletSetupError> {
        let mut orchestrator = PaymentOrchestrator::new(api);
        let mut evm = false;
        let mut solana = false;
        for (name, connection) in connections {
            let Some(descriptor) = self.wallet(&name) else {
                return Err(WalletSetupError::Unknown(name));
            };
            let connected = connection.chain_family();
            if descriptor.family.chain_family() != connected {
                return Err(WalletSetupError::FamilyMismatch {
                    family: descriptor.family,
                    connected,
                    name,
                });
            }
            let taken = match connected {
                ChainFamily::Evm => std::mem::replace(&mut evm, true),
                ChainFamily::Solana => std::mem::replace(&mut solana, true),
            };
            if taken {
                return Err(WalletSetupError::Duplicate {
                    name,
                    family: connected,
                });
            }
            tracing::debug!(wallet = %name, family = ?descriptor.family, "wallet connected");
            orchestrator = match connection {
                WalletConnection::Evm(wallet) => orchestrator.with_evm(EvmAdapter::new(wallet)),
                WalletConnection::Solana(wallet) => {
                    orchestrator.with_solana(self.solana_adapter(wallet))
                }
            };
        }
        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Signature, U256};
    use async_trait::async_trait;
    use linkpay::Network;
    use linkpay::wallet::WalletError;
    use linkpay_evm::wallet::ReceiptStatus;
    use linkpay_svm::KeypairWallet;
    use solana_keypair::Keypair;

    struct DisconnectedEvm;

    #[async_trait]
    impl EvmWallet for DisconnectedEvm {
        fn address(&self) -> Option<Address> {
            None
        }

        async fn sign_hash(&self, _hash: &B256) -> Result<Signature, WalletError> {
            Err(WalletError::NotConnected)
        }

        async fn transfer_token(
            &self,
            _token: Address,
            _to: Address,
            _amount: U256,
        ) -> Result<B256, WalletError> {
            Err(WalletError::NotConnected)
        }

        async fn receipt_status(&self, _tx_hash: B256) -> Result<ReceiptStatus, WalletError> {
            Err(WalletError::NotConnected)
        }
    }

    fn with_wallets() -> ClientConfig {
        serde_json::from_str(
            r#"{
                "ledger_url": "http://localhost:4021/",
                "wallets": [
                    {"name": "MetaMask", "family": "evm_injected"},
                    {"name": "Rainbow", "family": "evm_wallet_connect", "icon": "data:image/png;base64,"},
                    {"name": "Phantom", "family": "solana"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn api(config: &ClientConfig) -> Arc<dyn SettlementApi> {
        Arc::new(config.settlement_api())
    }

    fn evm_connection() -> WalletConnection {
        WalletConnection::Evm(Arc::new(DisconnectedEvm))
    }

    fn solana_connection() -> WalletConnection {
        WalletConnection::Solana(Arc::new(KeypairWallet::new(Keypair::new())))
    }

    #[test]
    fn configured_wallets_enable_their_chains() {
        let config = with_wallets();
        assert_eq!(config.wallet("Rainbow").unwrap().family, WalletFamily::EvmWalletConnect);

        let evm_only = config
            .orchestrator(api(&config), [("MetaMask".to_owned(), evm_connection())])
            .unwrap();
        assert!(evm_only.supports(Network::Base));
        assert!(!evm_only.supports(Network::Solana));

        let both = config
            .orchestrator(
                api(&config),
                [
                    ("Rainbow".to_owned(), evm_connection()),
                    ("Phantom".to_owned(), solana_connection()),
                ],
            )
            .unwrap();
        assert!(both.supports(Network::BaseSepolia));
        assert!(both.supports(Network::SolanaDevnet));
    }

    #[test]
    fn mismatched_or_unknown_wallets_are_refused() {
        let config = with_wallets();
        let err = config
            .orchestrator(api(&config), [("Phantom".to_owned(), evm_connection())])
            .unwrap_err();
        assert_eq!(
            err,
            WalletSetupError::FamilyMismatch {
                name: "Phantom".into(),
                family: WalletFamily::Solana,
                connected: ChainFamily::Evm,
            }
        );

        let err = config
            .orchestrator(api(&config), [("Backpack".to_owned(), solana_connection())])
            .unwrap_err();
        assert_eq!(err, WalletSetupError::Unknown("Backpack".into()));

        let err = config
            .orchestrator(
                api(&config),
                [
                    ("MetaMask".to_owned(), evm_connection()),
                    ("Rainbow".to_owned(), evm_connection()),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, WalletSetupError::Duplicate { family: ChainFamily::Evm, .. }));
    }

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"ledger_url": "http://localhost:4021/"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("http://localhost:4021/".parse().unwrap()));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn fallback_endpoint_is_wired() {
        let mut config = ClientConfig::new("http://localhost:4021/".parse().unwrap());
        config.solana_fallback_rpc_url = Some("http://fallback.invalid".to_owned());
        let rpc = config.solana_rpc();
        assert_eq!(rpc.endpoint(), config.solana_rpc_url);
        assert!(format!("{rpc:?}").contains("fallback.invalid"));
    }
}
