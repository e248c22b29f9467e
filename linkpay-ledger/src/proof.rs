//! Payment proofs accepted by the ledger and their canonical references.

use alloy_primitives::{Address, U256};
use linkpay::proto::PaymentPayload;
use linkpay::{ChainFamily, Network, UnixTimestamp};
use linkpay_evm::reference::{authorization_reference, tx_hash_reference};
use linkpay_evm::verify::{ExpectedPayment, parse_payload, verify_payload};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::LedgerError;
use crate::models::Product;

/// Shape of a base58 Solana transaction signature.
static SOLANA_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{87,88}$").expect("valid signature pattern")
});

/// Whether `s` looks like a base58 Solana transaction signature.
#[must_use]
pub fn is_solana_signature(s: &str) -> bool {
    SOLANA_SIGNATURE.is_match(s)
}

/// How much the ledger checks an x402 payload before accepting it.
///
/// Neither mode queries the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvmProofPolicy {
    /// Recover the EIP-712 signer and check payer, payee, amount and
    /// validity window against the product and buyer.
    #[default]
    Signature,
    /// Accept any well-formed payload; only derive its reference.
    Trust,
}

/// Evidence that a buyer paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof {
    /// A signed x402 `exact` payload (EVM).
    X402(PaymentPayload),
    /// A landed transaction: an EVM transaction hash or a Solana signature.
    Transaction {
        /// Network the transaction landed on.
        network: Network,
        /// Hash or signature as submitted.
        reference: String,
    },
}

impl Proof {
    /// Network the payment was made on, if it is one of `accepted`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidProof`] for an x402 payload on an unknown or
    /// non-EVM network, or for any payment on a network outside `accepted`.
    pub fn network(&self, accepted: &[Network]) -> Result<Network, LedgerError> {
        let network = match self {
            Self::X402(payload) => {
                let network: Network = payload
                    .network
                    .parse()
                    .map_err(|e| LedgerError::InvalidProof(format!("{e}")))?;
                if network.family() != ChainFamily::Evm {
                    return Err(LedgerError::InvalidProof(format!(
                        "x402 payloads are only accepted on EVM networks, got {network}"
                    )));
                }
                network
            }
            Self::Transaction { network, .. } => *network,
        };
        if !accepted.contains(&network) {
            return Err(LedgerError::InvalidProof(format!(
                "payments on {network} are not accepted"
            )));
        }
        Ok(network)
    }

    /// The canonical on-chain reference recorded for this payment.
    ///
    /// x402 payloads: a hash of chain, token, payer and nonce, which USDC
    /// itself treats as single-use. EVM transactions: the lowercased hash.
    /// Solana transactions: the signature itself.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidProof`] if the signature or hash is malformed.
    pub fn reference(&self) -> Result<String, LedgerError> {
        match self {
            Self::X402(payload) => authorization_reference(&parse_payload(payload)?)
                .map_err(|e| LedgerError::InvalidProof(e.to_string())),
            Self::Transaction { network, reference } => match network.family() {
                ChainFamily::Evm => tx_hash_reference(reference)
                    .map_err(|e| LedgerError::InvalidProof(e.to_string())),
                ChainFamily::Solana if is_solana_signature(reference.trim()) => {
                    Ok(reference.trim().to_owned())
                }
                ChainFamily::Solana => Err(LedgerError::InvalidProof(
                    "not a base58 Solana transaction signature".to_owned(),
                )),
            },
        }
    }

    /// Checks the proof against the product being bought.
    ///
    /// Only x402 payloads under [`EvmProofPolicy::Signature`] carry enough
    /// information to check anything offline.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidProof`] if the payload does not authorize
    /// `buyer` paying the product's creator at least its price.
    pub fn check(
        &self,
        product: &Product,
        buyer: &str,
        policy: EvmProofPolicy,
    ) -> Result<(), LedgerError> {
        let Self::X402(payload) = self else {
            return Ok(());
        };
        if policy == EvmProofPolicy::Trust {
            return Ok(());
        }
        let expected = ExpectedPayment {
            buyer: parse_address("buyer", buyer)?,
            pay_to: parse_address("creator", &product.creator_address)?,
            min_value: U256::from(product.price_units.unsigned_abs()),
        };
        verify_payload(payload, &expected, UnixTimestamp::now())?;
        Ok(())
    }
}

fn parse_address(role: &str, value: &str) -> Result<Address, LedgerError> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidProof(format!("{role} {value:?} is not an EVM address")))
}
