//! Static chain and coin-type registries
//!
//! Read-only metadata the validator uses to describe endpoints: EVM chain
//! ids map to names, native symbols and explorers; SLIP-44 coin types map
//! to coin names and symbols.

use serde::Serialize;
use std::collections::HashMap;

/// EVM chain metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: &'static str,
    /// Network tag, e.g. `"mainnet"` or `"goerli"`
    pub network: Option<&'static str>,
    pub symbol: &'static str,
    pub explorers: &'static [&'static str],
}

impl ChainInfo {
    const fn new(
        chain_id: u64,
        name: &'static str,
        network: Option<&'static str>,
        symbol: &'static str,
        explorers: &'static [&'static str],
    ) -> Self {
        Self {
            chain_id,
            name,
            network,
            symbol,
            explorers,
        }
    }
}

/// SLIP-44 entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44Coin {
    /// Hardened coin type, e.g. `0x80000039`
    pub coin_type: u32,
    pub symbol: &'static str,
    pub name: &'static str,
}

pub trait ChainRegistry: Send + Sync {
    fn chain(&self, chain_id: u64) -> Option<ChainInfo>;
}

pub trait Bip44Registry: Send + Sync {
    fn by_name(&self, name: &str) -> Option<Bip44Coin>;

    /// Entry shared by all test networks
    fn testnet(&self) -> Option<Bip44Coin>;
}

const EVM_CHAINS: &[ChainInfo] = &[
    ChainInfo::new(1, "Ethereum Mainnet", Some("mainnet"), "ETH", &["https://etherscan.io"]),
    ChainInfo::new(5, "Ethereum Testnet Goerli", Some("goerli"), "ETH", &["https://goerli.etherscan.io"]),
    ChainInfo::new(10, "Optimism", Some("optimism"), "ETH", &["https://optimistic.etherscan.io"]),
    ChainInfo::new(56, "Binance Smart Chain Mainnet", Some("bsc"), "BNB", &["https://bscscan.com"]),
    ChainInfo::new(57, "Syscoin Mainnet", Some("mainnet"), "SYS", &["https://explorer.syscoin.org"]),
    ChainInfo::new(137, "Polygon Mainnet", Some("matic"), "MATIC", &["https://polygonscan.com"]),
    ChainInfo::new(5700, "Syscoin Tanenbaum Testnet", Some("tanenbaum"), "tSYS", &["https://tanenbaum.io"]),
    ChainInfo::new(8453, "Base", Some("base"), "ETH", &["https://basescan.org"]),
    ChainInfo::new(42161, "Arbitrum One", Some("arbitrum"), "ETH", &["https://arbiscan.io"]),
    ChainInfo::new(43114, "Avalanche C-Chain", Some("avalanche"), "AVAX", &["https://snowtrace.io"]),
    ChainInfo::new(80001, "Mumbai", Some("mumbai"), "MATIC", &["https://mumbai.polygonscan.com"]),
    ChainInfo::new(11155111, "Sepolia", Some("sepolia"), "ETH", &["https://sepolia.etherscan.io"]),
];

/// Ordered like SLIP-44: index 1 is the shared testnet entry.
const BIP44_COINS: &[Bip44Coin] = &[
    Bip44Coin { coin_type: 0x8000_0000, symbol: "BTC", name: "Bitcoin" },
    Bip44Coin { coin_type: 0x8000_0001, symbol: "", name: "Testnet (all coins)" },
    Bip44Coin { coin_type: 0x8000_0002, symbol: "LTC", name: "Litecoin" },
    Bip44Coin { coin_type: 0x8000_0003, symbol: "DOGE", name: "Dogecoin" },
    Bip44Coin { coin_type: 0x8000_0005, symbol: "DASH", name: "Dash" },
    Bip44Coin { coin_type: 0x8000_0014, symbol: "DGB", name: "DigiByte" },
    Bip44Coin { coin_type: 0x8000_0039, symbol: "SYS", name: "Syscoin" },
    Bip44Coin { coin_type: 0x8000_003c, symbol: "ETH", name: "Ethereum" },
    Bip44Coin { coin_type: 0x8000_0085, symbol: "ZEC", name: "Zcash" },
    Bip44Coin { coin_type: 0x8000_0091, symbol: "BCH", name: "Bitcoin Cash" },
];

/// Built-in EVM chain table
pub struct StaticChainRegistry {
    chains: HashMap<u64, ChainInfo>,
}

impl StaticChainRegistry {
    pub fn new() -> Self {
        let chains = EVM_CHAINS
            .iter()
            .map(|chain| (chain.chain_id, *chain))
            .collect();
        Self { chains }
    }
}

impl Default for StaticChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainRegistry for StaticChainRegistry {
    fn chain(&self, chain_id: u64) -> Option<ChainInfo> {
        self.chains.get(&chain_id).copied()
    }
}

/// Built-in SLIP-44 table
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticBip44Registry;

impl Bip44Registry for StaticBip44Registry {
    fn by_name(&self, name: &str) -> Option<Bip44Coin> {
        BIP44_COINS
            .iter()
            .find(|coin| coin.name.eq_ignore_ascii_case(name.trim()))
            .copied()
    }

    fn testnet(&self) -> Option<Bip44Coin> {
        BIP44_COINS.get(1).copied()
    }
}
