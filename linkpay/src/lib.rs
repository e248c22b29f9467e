#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for linkpay, a pay-to-unlock link service settled in USDC.
//!
//! A creator publishes a URL as a paid product; a buyer unlocks it by paying
//! on Base (EVM) or Solana. This crate holds everything both sides of that
//! exchange agree on, independent of any chain SDK.
//!
//! # Modules
//!
//! - [`amount`] - Decimal USDC prices and their base-unit representation
//! - [`constants`] - HTTP header names and protocol constants
//! - [`error`] - Protocol and chain adapter error taxonomy
//! - [`network`] - Supported networks, CAIP-2 ids and USDC deployments
//! - [`proto`] - x402 `PaymentRequired` / `PaymentPayload` envelopes and their codec
//! - [`settlement`] - Wire types exchanged with the settlement endpoints
//! - [`timestamp`] - Unix timestamps for authorization windows
//! - [`wallet`] - Wallet capability model shared by the chain adapters

pub mod amount;
pub mod constants;
pub mod error;
pub mod network;
pub mod proto;
pub mod settlement;
pub mod timestamp;
pub mod wallet;

pub use error::{AdapterError, ProtocolError};
pub use network::{ChainFamily, Network};
pub use proto::{PaymentPayload, PaymentRequired, PaymentRequirements};
pub use settlement::Settlement;
pub use timestamp::UnixTimestamp;
