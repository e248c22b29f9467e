#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM chain adapter for linkpay.
//!
//! Two ways to pay on Base:
//!
//! - **x402 authorization**: the buyer signs an EIP-712
//!   `TransferWithAuthorization` off-chain (no gas), and the signed payload
//!   travels to the settlement server in the `X-PAYMENT` header.
//! - **Direct transfer**: the buyer's wallet calls USDC `transfer` itself,
//!   pays gas, and the adapter waits for the receipt.
//!
//! The settlement server uses [`verify`] and [`reference`] to check a
//! payload offline and to derive the on-chain reference it records.
//!
//! # Feature Flags
//!
//! - `wallet` - [`LocalEvmWallet`](local::LocalEvmWallet), a private-key wallet
//!   backed by an alloy provider

pub mod adapter;
pub mod authorization;
#[cfg(feature = "wallet")]
pub mod local;
pub mod networks;
pub mod reference;
pub mod types;
pub mod verify;
pub mod wallet;

pub use adapter::EvmAdapter;
pub use authorization::SignedAuthorization;
pub use wallet::EvmWallet;
