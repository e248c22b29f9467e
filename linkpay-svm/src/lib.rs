#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana chain adapter for linkpay.
//!
//! Pays a creator by sending an SPL `transferChecked` of USDC from the
//! buyer's associated token account to the creator's, creating the
//! creator's account in the same transaction when it does not exist yet.
//!
//! Public RPC endpoints are unreliable, so every RPC call goes through
//! [`FallbackRpc`](rpc::FallbackRpc): a transient failure on the primary
//! endpoint is retried once on a fallback endpoint before surfacing.
//! Confirmation is bounded by the blockhash's last valid block height.

pub mod adapter;
pub mod ata;
pub mod networks;
pub mod rpc;
pub mod wallet;

pub use adapter::{PreparedTransfer, SolanaAdapter};
pub use rpc::{FallbackRpc, HttpSolanaRpc, RpcFailure, RpcFailureKind, SolanaRpc};
pub use wallet::{KeypairWallet, SolanaWallet};
