//! USDC deployments on the supported EVM networks.

use alloy_primitives::{Address, address};
use alloy_sol_types::{Eip712Domain, eip712_domain};
use linkpay::Network;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// EIP-712 domain name of USDC.
pub const USDC_DOMAIN_NAME: &str = "USD Coin";

/// EIP-712 domain version of USDC.
pub const USDC_DOMAIN_VERSION: &str = "2";

/// Where USDC lives on one EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcDeployment {
    /// The network.
    pub network: Network,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract.
    pub address: Address,
}

impl UsdcDeployment {
    /// The deployment on `network`, or `None` for non-EVM networks.
    #[must_use]
    pub const fn for_network(network: Network) -> Option<Self> {
        let address = match network {
            Network::Base => USDC_BASE,
            Network::BaseSepolia => USDC_BASE_SEPOLIA,
            Network::Solana | Network::SolanaDevnet => return None,
        };
        match network.evm_chain_id() {
            Some(chain_id) => Some(Self {
                network,
                chain_id,
                address,
            }),
            None => None,
        }
    }

    /// The EIP-712 domain USDC signs `TransferWithAuthorization` under.
    #[must_use]
    pub fn domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: USDC_DOMAIN_NAME,
            version: USDC_DOMAIN_VERSION,
            chain_id: self.chain_id,
            verifying_contract: self.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_match_network_registry() {
        for network in [Network::Base, Network::BaseSepolia] {
            let deployment = UsdcDeployment::for_network(network).unwrap();
            let registered: Address = network.usdc_asset().parse().unwrap();
            assert_eq!(deployment.address, registered);
        }
        assert!(UsdcDeployment::for_network(Network::Solana).is_none());
    }
}
