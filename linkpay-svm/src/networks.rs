//! USDC mints on the supported Solana clusters.

use linkpay::Network;
use linkpay::network::USDC_DECIMALS;
use solana_pubkey::{Pubkey, pubkey};

/// USDC mint on mainnet-beta.
pub const USDC_MINT_MAINNET: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// USDC mint on devnet.
pub const USDC_MINT_DEVNET: Pubkey = pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");

/// Where USDC lives on one Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcMint {
    /// The cluster.
    pub network: Network,
    /// Mint address.
    pub mint: Pubkey,
    /// Owning token program.
    pub token_program: Pubkey,
    /// Mint decimals.
    pub decimals: u8,
}

impl UsdcMint {
    /// The USDC mint on `network`, or `None` for non-Solana networks.
    #[must_use]
    pub fn for_network(network: Network) -> Option<Self> {
        let mint = match network {
            Network::Solana => USDC_MINT_MAINNET,
            Network::SolanaDevnet => USDC_MINT_DEVNET,
            Network::Base | Network::BaseSepolia => return None,
        };
        Some(Self {
            network,
            mint,
            token_program: spl_token::id(),
            decimals: USDC_DECIMALS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_match_network_registry() {
        for network in [Network::Solana, Network::SolanaDevnet] {
            let usdc = UsdcMint::for_network(network).unwrap();
            assert_eq!(usdc.mint.to_string(), network.usdc_asset());
            assert_eq!(usdc.decimals, 6);
        }
        assert!(UsdcMint::for_network(Network::Base).is_none());
    }
}
