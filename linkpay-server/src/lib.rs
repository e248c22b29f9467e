//! Settlement server for linkpay.
//!
//! Exposes the [`SqliteLedger`](linkpay_ledger::SqliteLedger) over HTTP so
//! buyers can turn a payment into an unlocked link.
//!
//! # Modules
//!
//! - [`handlers`] - Axum route handlers and router builder
//! - [`error`] - Error responses with stable reason tags
//! - [`config`] - Server configuration with environment variable expansion

pub mod config;
pub mod error;
pub mod handlers;

pub use handlers::{AppState, router};
