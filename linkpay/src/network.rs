//! Networks linkpay settles on.
//!
//! Each [`Network`] knows its CAIP-2 identifier, the chain family that
//! handles it, the name recorded in the ledger, and where USDC lives on it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Chain family, selecting which adapter handles a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    /// EVM chains (EIP-712 authorizations, ERC-20 transfers).
    Evm,
    /// Solana clusters (SPL token transfers).
    Solana,
}

/// A supported settlement network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// Base mainnet.
    Base,
    /// Base Sepolia testnet.
    BaseSepolia,
    /// Solana mainnet-beta.
    Solana,
    /// Solana devnet.
    SolanaDevnet,
}

/// USDC uses 6 decimal places on every supported network.
pub const USDC_DECIMALS: u8 = 6;

impl Network {
    /// All supported networks.
    pub const ALL: [Self; 4] = [Self::Base, Self::BaseSepolia, Self::Solana, Self::SolanaDevnet];

    /// The networks moving real USDC.
    pub const MAINNETS: [Self; 2] = [Self::Base, Self::Solana];

    /// Human-readable network name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::BaseSepolia => "base-sepolia",
            Self::Solana => "solana",
            Self::SolanaDevnet => "solana-devnet",
        }
    }

    /// CAIP-2 chain identifier used in x402 envelopes.
    #[must_use]
    pub const fn caip2(self) -> &'static str {
        match self {
            Self::Base => "eip155:8453",
            Self::BaseSepolia => "eip155:84532",
            Self::Solana => "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
            Self::SolanaDevnet => "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        }
    }

    /// Chain family handling this network.
    #[must_use]
    pub const fn family(self) -> ChainFamily {
        match self {
            Self::Base | Self::BaseSepolia => ChainFamily::Evm,
            Self::Solana | Self::SolanaDevnet => ChainFamily::Solana,
        }
    }

    /// Name stored on purchase rows: `base` or `solana`.
    #[must_use]
    pub const fn ledger_name(self) -> &'static str {
        match self.family() {
            ChainFamily::Evm => "base",
            ChainFamily::Solana => "solana",
        }
    }

    /// EVM chain id, for EVM networks.
    #[must_use]
    pub const fn evm_chain_id(self) -> Option<u64> {
        match self {
            Self::Base => Some(8453),
            Self::BaseSepolia => Some(84532),
            Self::Solana | Self::SolanaDevnet => None,
        }
    }

    /// USDC token contract (EVM) or mint (Solana) address.
    #[must_use]
    pub const fn usdc_asset(self) -> &'static str {
        match self {
            Self::Base => "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            Self::BaseSepolia => "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            Self::Solana => "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            Self::SolanaDevnet => "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
        }
    }

    /// Whether this is a test network.
    #[must_use]
    pub const fn is_testnet(self) -> bool {
        matches!(self, Self::BaseSepolia | Self::SolanaDevnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A network string that names no supported network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|n| n.name().eq_ignore_ascii_case(needle) || n.caip2() == needle)
            .ok_or_else(|| UnknownNetwork(s.to_owned()))
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
