#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Buyer-side payment flow for linkpay.
//!
//! [`PaymentOrchestrator`] drives one payment attempt at a time through
//! `idle → signing → submitting → verifying → success | error`, using the
//! EVM or Solana adapter to move funds and the settlement server to unlock
//! the product. Observers follow progress with
//! [`PaymentOrchestrator::subscribe`].
//!
//! The settlement server is reached through the [`SettlementApi`] trait;
//! [`HttpSettlementApi`] is the `reqwest` implementation.

pub mod config;
pub mod orchestrator;
pub mod settlement_api;
pub mod state;

pub use config::{ClientConfig, WalletConnection, WalletSetupError};
pub use orchestrator::{PayError, PaymentMethod, PaymentOrchestrator, PaymentRequest};
pub use settlement_api::{HttpSettlementApi, SettlementApi, SettlementApiError};
pub use state::PaymentState;
