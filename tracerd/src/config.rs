use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};

use crate::evm::search::SearchConfig;
use crate::url::Url;

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bind_address: SocketAddrV4,
    pub base: EvmRpcConfig,
    pub solana: SolanaRpcConfig,
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000),
            base: EvmRpcConfig::default(),
            solana: SolanaRpcConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(default)]
pub struct EvmRpcConfig {
    #[serde(deserialize_with = "Url::deserialize_sensitive")]
    pub mainnet_rpc_url: Url,
    #[serde(deserialize_with = "Url::deserialize_sensitive")]
    pub sepolia_rpc_url: Url,
}

impl Default for EvmRpcConfig {
    fn default() -> Self {
        Self {
            mainnet_rpc_url: Url::new_sensitive("https://mainnet.base.org").unwrap(),
            sepolia_rpc_url: Url::new_sensitive("https://sepolia.base.org").unwrap(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(default)]
pub struct SolanaRpcConfig {
    #[serde(deserialize_with = "Url::deserialize_sensitive")]
    pub mainnet_rpc_url: Url,
    #[serde(deserialize_with = "Url::deserialize_sensitive")]
    pub devnet_rpc_url: Url,
}

impl Default for SolanaRpcConfig {
    fn default() -> Self {
        Self {
            mainnet_rpc_url: Url::new_sensitive("https://api.mainnet-beta.solana.com").unwrap(),
            devnet_rpc_url: Url::new_sensitive("https://api.devnet.solana.com").unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn deserialize_empty_config_falls_back_on_defaults() {
        let cfg: Config = toml::from_str("").unwrap();

        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn deserialize_partial_config() {
        let cfg: Config = toml::from_str(
            "
            bind_address = '0.0.0.0:8080'

            [base]
            mainnet_rpc_url = 'https://base-mainnet.example.com/v2/some-key'

            [search]
            chunk_size = 5000
            ",
        )
        .unwrap();

        assert_eq!(cfg.bind_address.to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.search.chunk_size, 5000);
        assert_eq!(cfg.search.concurrency, 3);
        assert_eq!(cfg.base.mainnet_rpc_url.to_string(), "[REDACTED]");
        assert_eq!(
            cfg.base.sepolia_rpc_url,
            Config::default().base.sepolia_rpc_url
        );
    }

    #[test]
    fn config_round_trip() {
        let cfg = Config::default();
        let serialized = toml::to_string(&cfg).unwrap();

        assert_eq!(toml::from_str::<Config>(&serialized).unwrap(), cfg);
    }
}
