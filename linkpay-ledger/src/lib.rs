//! The settlement ledger.
//!
//! [`SqliteLedger::verify_payment`] is the single authority that turns a
//! claimed on-chain payment into a recorded purchase. Within one database
//! transaction it checks that the product exists and is on sale, claims the
//! payment's on-chain reference (unique across all purchases), records the
//! purchase, bumps the product's sold count and credits the creator. Either
//! all of it happens or none of it does.
//!
//! The remaining methods are the small CRUD surface the rest of the
//! application needs around that: creating and toggling products, and
//! reading purchases and earnings back.

pub mod error;
pub mod models;
pub mod obfuscation;
pub mod proof;
pub mod sqlite;

pub use error::LedgerError;
pub use models::{NewProduct, Product, Purchase};
pub use proof::{EvmProofPolicy, Proof};
pub use sqlite::SqliteLedger;
