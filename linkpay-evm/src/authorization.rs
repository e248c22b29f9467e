//! Building and hashing `TransferWithAuthorization` messages.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolStruct;
use linkpay::constants::{EXACT_SCHEME, MAX_TIMEOUT_SECONDS, X402_VERSION};
use linkpay::proto::{Authorization, ExactPayload, PaymentPayload, codec};
use linkpay::{Network, ProtocolError, UnixTimestamp};
use rand::RngExt;
use rand::rng;

use crate::networks::UsdcDeployment;
use crate::types::TransferWithAuthorization;

/// An authorization together with the payer's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    /// Network the authorization is redeemable on.
    pub network: Network,
    /// Payer.
    pub from: Address,
    /// Payee.
    pub to: Address,
    /// Amount in USDC base units.
    pub value: U256,
    /// Earliest redemption time.
    pub valid_after: UnixTimestamp,
    /// Redemption deadline (exclusive).
    pub valid_before: UnixTimestamp,
    /// Random 32-byte nonce.
    pub nonce: B256,
    /// 65-byte ECDSA signature over the EIP-712 hash.
    pub signature: Bytes,
}

impl SignedAuthorization {
    /// The typed-data struct that was signed.
    #[must_use]
    pub fn message(&self) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }

    /// The x402 payload carrying this authorization.
    ///
    /// The validity window is copied verbatim so the signature still covers it.
    #[must_use]
    pub fn to_payment_payload(&self) -> PaymentPayload {
        PaymentPayload {
            x402_version: X402_VERSION,
            scheme: EXACT_SCHEME.to_owned(),
            network: self.network.caip2().to_owned(),
            payload: ExactPayload {
                signature: self.signature.to_string(),
                authorization: Authorization {
                    from: self.from.to_string(),
                    to: self.to.to_string(),
                    value: self.value.to_string(),
                    valid_after: self.valid_after,
                    valid_before: self.valid_before,
                    nonce: self.nonce.to_string(),
                },
            },
        }
    }

    /// Encodes the payload for the `X-PAYMENT` header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        codec::encode(&self.to_payment_payload())
    }
}

/// An authorization that still needs to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedAuthorization {
    /// Where the authorization is redeemable.
    pub deployment: UsdcDeployment,
    /// The typed-data message.
    pub message: TransferWithAuthorization,
}

impl UnsignedAuthorization {
    /// Builds an authorization valid from the epoch until 300 seconds from
    /// now, with a fresh random nonce.
    #[must_use]
    pub fn new(deployment: UsdcDeployment, from: Address, to: Address, value: U256) -> Self {
        let valid_before = UnixTimestamp::now() + MAX_TIMEOUT_SECONDS;
        Self {
            deployment,
            message: TransferWithAuthorization {
                from,
                to,
                value,
                validAfter: U256::ZERO,
                validBefore: U256::from(valid_before.as_secs()),
                nonce: random_nonce(),
            },
        }
    }

    /// The EIP-712 digest the wallet must sign.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.deployment.domain())
    }

    /// Attaches a signature.
    #[must_use]
    pub fn into_signed(self, signature: Bytes) -> SignedAuthorization {
        let m = self.message;
        SignedAuthorization {
            network: self.deployment.network,
            from: m.from,
            to: m.to,
            value: m.value,
            valid_after: UnixTimestamp::from_secs(m.validAfter.saturating_to()),
            valid_before: UnixTimestamp::from_secs(m.validBefore.saturating_to()),
            nonce: m.nonce,
            signature,
        }
    }
}

/// A probabilistically unique nonce: `keccak256(now || 32 random bytes)`.
#[must_use]
pub fn random_nonce() -> B256 {
    let entropy: [u8; 32] = rng().random();
    let mut seed = Vec::with_capacity(40);
    seed.extend_from_slice(&UnixTimestamp::now().as_secs().to_be_bytes());
    seed.extend_from_slice(&entropy);
    keccak256(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn unsigned() -> UnsignedAuthorization {
        UnsignedAuthorization::new(
            UsdcDeployment::for_network(Network::BaseSepolia).unwrap(),
            address!("1111111111111111111111111111111111111111"),
            address!("2222222222222222222222222222222222222222"),
            U256::from(9_990_000u64),
        )
    }

    #[test]
    fn nonces_differ() {
        assert_ne!(random_nonce(), random_nonce());
        assert_ne!(unsigned().message.nonce, unsigned().message.nonce);
    }

    #[test]
    fn window_is_three_hundred_seconds() {
        let now = UnixTimestamp::now().as_secs();
        let auth = unsigned();
        let before: u64 = auth.message.validBefore.saturating_to();
        assert_eq!(auth.message.validAfter, U256::ZERO);
        assert!((now + 300..=now + 301).contains(&before));
    }

    #[test]
    fn signing_hash_depends_on_chain() {
        let auth = unsigned();
        let mut mainnet = auth.clone();
        mainnet.deployment = UsdcDeployment::for_network(Network::Base).unwrap();
        assert_ne!(auth.signing_hash(), mainnet.signing_hash());
    }

    #[test]
    fn payload_preserves_signed_window() {
        let auth = unsigned();
        let expected_before = auth.message.validBefore;
        let signed = auth.into_signed(Bytes::from(vec![0u8; 65]));
        let payload = signed.to_payment_payload();
        assert_eq!(payload.network, "eip155:84532");
        assert_eq!(
            U256::from(payload.payload.authorization.valid_before.as_secs()),
            expected_before
        );
        assert_eq!(payload.payload.authorization.value, "9990000");
        assert!(payload.payload.signature.starts_with("0x"));
    }
}
