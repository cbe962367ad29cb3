//! Default network table
//!
//! Every built-in network can have its endpoint overridden from the
//! environment. Without overrides the public endpoints below are used.
//!
//! # Examples
//!
//! ```bash
//! # Use a private Ethereum endpoint and a self-hosted Blockbook
//! export ETH_RPC_URL="https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! export SYSCOIN_BLOCKBOOK_URL="https://blockbook.example.org/"
//! ```

use crate::keyring::{Network, NetworkFamily, NetworkMap};
use std::collections::BTreeMap;

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const POLYGON: u64 = 137;
    pub const MUMBAI: u64 = 80001;
    pub const SYSCOIN_NEVM: u64 = 57;
    pub const TANENBAUM: u64 = 5700;
    pub const SYSCOIN_MAINNET: u64 = 57;
    pub const SYSCOIN_TESTNET: u64 = 5700;
}

/// Environment variable names
mod env_vars {
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const POLYGON_RPC_URL: &str = "POLYGON_RPC_URL";
    pub const MUMBAI_RPC_URL: &str = "MUMBAI_RPC_URL";
    pub const SYSCOIN_NEVM_RPC_URL: &str = "SYSCOIN_NEVM_RPC_URL";
    pub const TANENBAUM_RPC_URL: &str = "TANENBAUM_RPC_URL";
    pub const SYSCOIN_BLOCKBOOK_URL: &str = "SYSCOIN_BLOCKBOOK_URL";
    pub const SYSCOIN_TESTNET_BLOCKBOOK_URL: &str = "SYSCOIN_TESTNET_BLOCKBOOK_URL";
}

/// Public endpoints
mod public_rpcs {
    pub const ETHEREUM: &str = "https://rpc.ankr.com/eth";
    pub const POLYGON: &str = "https://polygon-rpc.com";
    pub const MUMBAI: &str = "https://endpoints.omniatech.io/v1/matic/mumbai/public";
    pub const SYSCOIN_NEVM: &str = "https://rpc.syscoin.org";
    pub const TANENBAUM: &str = "https://rpc.tanenbaum.io";
    pub const SYSCOIN_BLOCKBOOK: &str = "https://blockbook.elint.services/";
    pub const SYSCOIN_TESTNET_BLOCKBOOK: &str = "https://blockbook-dev.elint.services/";
}

fn endpoint(var: &str, fallback: &str, name: &str) -> String {
    match std::env::var(var) {
        Ok(url) if !url.trim().is_empty() => {
            tracing::debug!("Using {} for {}", var, name);
            url
        }
        _ => fallback.to_string(),
    }
}

struct Builtin {
    chain_id: u64,
    label: &'static str,
    currency: &'static str,
    api_url: &'static str,
    explorer: &'static str,
    slip44: Option<u32>,
}

impl Builtin {
    fn into_network(self, url: String) -> Network {
        Network {
            chain_id: self.chain_id,
            label: self.label.to_string(),
            url,
            api_url: self.api_url.to_string(),
            explorer: self.explorer.to_string(),
            currency: self.currency.to_string(),
            default: true,
            slip44: self.slip44,
        }
    }
}

/// Syscoin UTXO mainnet, the network a fresh wallet starts on
pub fn syscoin_mainnet() -> Network {
    let url = endpoint(
        env_vars::SYSCOIN_BLOCKBOOK_URL,
        public_rpcs::SYSCOIN_BLOCKBOOK,
        "Syscoin Mainnet",
    );
    Builtin {
        chain_id: chains::SYSCOIN_MAINNET,
        label: "Syscoin Mainnet",
        currency: "sys",
        api_url: "",
        explorer: public_rpcs::SYSCOIN_BLOCKBOOK,
        slip44: Some(57),
    }
    .into_network(url)
}

fn syscoin_networks() -> BTreeMap<u64, Network> {
    let testnet = Builtin {
        chain_id: chains::SYSCOIN_TESTNET,
        label: "Syscoin Testnet",
        currency: "tsys",
        api_url: "",
        explorer: "",
        slip44: Some(5700),
    }
    .into_network(endpoint(
        env_vars::SYSCOIN_TESTNET_BLOCKBOOK_URL,
        public_rpcs::SYSCOIN_TESTNET_BLOCKBOOK,
        "Syscoin Testnet",
    ));

    BTreeMap::from([
        (chains::SYSCOIN_MAINNET, syscoin_mainnet()),
        (chains::SYSCOIN_TESTNET, testnet),
    ])
}

fn ethereum_networks() -> BTreeMap<u64, Network> {
    let table = [
        (
            env_vars::ETH_RPC_URL,
            public_rpcs::ETHEREUM,
            Builtin {
                chain_id: chains::ETHEREUM,
                label: "Ethereum Mainnet",
                currency: "eth",
                api_url: "https://api.etherscan.io/api",
                explorer: "https://etherscan.io/",
                slip44: None,
            },
        ),
        (
            env_vars::POLYGON_RPC_URL,
            public_rpcs::POLYGON,
            Builtin {
                chain_id: chains::POLYGON,
                label: "Polygon Mainnet",
                currency: "matic",
                api_url: "https://api.polygonscan.com/api",
                explorer: "https://polygonscan.com/",
                slip44: None,
            },
        ),
        (
            env_vars::MUMBAI_RPC_URL,
            public_rpcs::MUMBAI,
            Builtin {
                chain_id: chains::MUMBAI,
                label: "Mumbai Testnet",
                currency: "matic",
                api_url: "https://api-testnet.polygonscan.com/api",
                explorer: "https://mumbai.polygonscan.com/",
                slip44: None,
            },
        ),
        (
            env_vars::SYSCOIN_NEVM_RPC_URL,
            public_rpcs::SYSCOIN_NEVM,
            Builtin {
                chain_id: chains::SYSCOIN_NEVM,
                label: "Syscoin NEVM",
                currency: "sys",
                api_url: "https://explorer.syscoin.org/api",
                explorer: "https://explorer.syscoin.org/",
                slip44: None,
            },
        ),
        (
            env_vars::TANENBAUM_RPC_URL,
            public_rpcs::TANENBAUM,
            Builtin {
                chain_id: chains::TANENBAUM,
                label: "Tanenbaum Testnet",
                currency: "tsys",
                api_url: "https://tanenbaum.io/api",
                explorer: "https://tanenbaum.io/",
                slip44: None,
            },
        ),
    ];

    table
        .into_iter()
        .map(|(var, fallback, builtin)| {
            let url = endpoint(var, fallback, builtin.label);
            (builtin.chain_id, builtin.into_network(url))
        })
        .collect()
}

/// Built-in networks for both families, all marked `default`.
pub fn default_networks() -> NetworkMap {
    BTreeMap::from([
        (NetworkFamily::Syscoin, syscoin_networks()),
        (NetworkFamily::Ethereum, ethereum_networks()),
    ])
}
