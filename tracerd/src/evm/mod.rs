use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::types::ChainName;

pub mod classifier;
pub mod decoder;
pub mod events;
pub mod json_rpc;
pub mod search;
#[cfg(test)]
pub mod test_utils;

/// Sentinel the bridge contracts use for the native asset in place of an
/// ERC-20 address.
pub const ETH_SENTINEL: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
pub const ETH_DECIMALS: u8 = 18;

/// The EVM networks the bridge is deployed on. Which one a transaction
/// belongs to is discovered by probing and threaded through every call as an
/// explicit value, so decoders stay safely shareable across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvmNetwork {
    Mainnet,
    Sepolia,
}

impl EvmNetwork {
    /// Probe order: production first, then the test network.
    pub const PROBE_ORDER: [EvmNetwork; 2] = [EvmNetwork::Mainnet, EvmNetwork::Sepolia];

    pub fn chain_name(self) -> ChainName {
        match self {
            EvmNetwork::Mainnet => ChainName::Base,
            EvmNetwork::Sepolia => ChainName::BaseSepolia,
        }
    }

    /// The message-transport contract emitting initiation, transfer and
    /// relay events.
    pub fn bridge_address(self) -> Address {
        match self {
            EvmNetwork::Mainnet => parse_address("0x3eff766C76a1be2Ce1aCF2B69c78bCae257D5188"),
            EvmNetwork::Sepolia => parse_address("0x01824a90d32A69022DdAEcC6C5C14Ed08dB4EB9B"),
        }
    }

    /// The message-validator contract emitting registration events.
    pub fn validator_address(self) -> Address {
        match self {
            EvmNetwork::Mainnet => parse_address("0xAF24c1c24Ff3BF1e6D882518120fC25442d6794B"),
            EvmNetwork::Sepolia => parse_address("0x863Bed3E344035253CC44C75612Ad5fDF5904aEE"),
        }
    }

    /// Block at which the bridge contracts were deployed; no bridge log can
    /// exist before it, so historical searches never start earlier.
    pub fn deployment_block(self) -> u64 {
        match self {
            EvmNetwork::Mainnet => 30_550_000,
            EvmNetwork::Sepolia => 26_120_000,
        }
    }
}

fn parse_address(s: &str) -> Address {
    s.parse().expect("hardcoded address is valid")
}

/// True when the log's emitting address is one of the bridge-owned contracts
/// for the given network.
pub fn is_bridge_owned(network: EvmNetwork, address: Address) -> bool {
    address == network.bridge_address() || address == network.validator_address()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_tables_parse() {
        for network in EvmNetwork::PROBE_ORDER {
            assert_ne!(network.bridge_address(), Address::zero());
            assert_ne!(network.validator_address(), Address::zero());
            assert_ne!(network.bridge_address(), network.validator_address());
        }
    }

    #[test]
    fn networks_do_not_share_contracts() {
        assert_ne!(
            EvmNetwork::Mainnet.bridge_address(),
            EvmNetwork::Sepolia.bridge_address()
        );
    }
}
