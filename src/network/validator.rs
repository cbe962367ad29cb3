//! Endpoint validation for new networks
//!
//! EVM endpoints are probed with `eth_chainId`; UTXO endpoints are Blockbook
//! explorers probed with `GET /api/v2`. Successful probes are turned into
//! [`Network`] records ready for `KeyringManager::add_network`.

use super::registry::{
    Bip44Coin, Bip44Registry, ChainInfo, ChainRegistry, StaticBip44Registry, StaticChainRegistry,
};
use crate::keyring::Network;
use crate::rpc::{parse_endpoint, RpcClient};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Largest chain id wallets accept for EVM networks
pub const MAX_EVM_CHAIN_ID: u64 = 4_503_599_627_370_476;

const HARDENED: u32 = 0x8000_0000;
const UTXO_DECIMALS: u8 = 8;

/// Chain id as a caller supplies it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainIdInput {
    Number(u64),
    Text(String),
}

impl From<u64> for ChainIdInput {
    fn from(id: u64) -> Self {
        ChainIdInput::Number(id)
    }
}

impl From<&str> for ChainIdInput {
    fn from(id: &str) -> Self {
        ChainIdInput::Text(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIdValidation {
    pub valid: bool,
    pub hex_chain_id: String,
}

/// Hex strings are valid only in canonical form (no leading zero nibble).
/// Numbers, including decimal strings, are hex-encoded and always valid.
pub fn validate_chain_id(candidate: &ChainIdInput) -> ChainIdValidation {
    let text = match candidate {
        ChainIdInput::Number(id) => return encoded(*id),
        ChainIdInput::Text(text) => text.trim(),
    };

    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"));
    match digits {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            ChainIdValidation {
                valid: !digits.starts_with('0'),
                hex_chain_id: text.to_string(),
            }
        }
        Some(_) => ChainIdValidation {
            valid: false,
            hex_chain_id: text.to_string(),
        },
        None => match text.parse::<u64>() {
            Ok(id) => encoded(id),
            Err(_) => ChainIdValidation {
                valid: false,
                hex_chain_id: text.to_string(),
            },
        },
    }
}

fn encoded(id: u64) -> ChainIdValidation {
    ChainIdValidation {
        valid: true,
        hex_chain_id: format!("{:#x}", id),
    }
}

pub fn is_valid_chain_id_for_eth_networks(chain_id: u64) -> bool {
    chain_id > 0 && chain_id <= MAX_EVM_CHAIN_ID
}

/// Result of probing an EVM endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthRpcValidation {
    pub valid: bool,
    pub hex_chain_id: String,
    pub chain_id: u64,
    pub details: Option<ChainInfo>,
    /// Registry network tag, `"mainnet"` when unknown
    pub chain: String,
}

/// Caller input for registering an EVM network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthRpcRequest {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub explorer: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A SLIP-44 coin resolved to a chain id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44Chain {
    pub native_currency: NativeCurrency,
    pub coin_type: u32,
    pub chain_id: u64,
}

/// Result of probing a Blockbook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysRpcValidation {
    pub valid: bool,
    pub coin: String,
    /// Backend tier, `"main"` or `"test"`
    pub chain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44NetworkDetails {
    #[serde(flatten)]
    pub status: SysRpcValidation,
    #[serde(flatten)]
    pub bip44: Bip44Chain,
}

/// Caller input for registering a UTXO network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysRpcRequest {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// A UTXO network ready to register, with its coin metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SysRpc {
    pub network: Network,
    pub bip44: Bip44Chain,
}

/// Validates candidate endpoints against live nodes and static registries.
#[derive(Clone)]
pub struct NetworkValidator {
    rpc: Arc<dyn RpcClient>,
    chains: Arc<dyn ChainRegistry>,
    coins: Arc<dyn Bip44Registry>,
}

impl NetworkValidator {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self::with_registries(
            rpc,
            Arc::new(StaticChainRegistry::new()),
            Arc::new(StaticBip44Registry),
        )
    }

    pub fn with_registries(
        rpc: Arc<dyn RpcClient>,
        chains: Arc<dyn ChainRegistry>,
        coins: Arc<dyn Bip44Registry>,
    ) -> Self {
        Self { rpc, chains, coins }
    }

    // --- EVM -----------------------------------------------------------------

    pub async fn validate_eth_rpc(&self, url: &str) -> Result<EthRpcValidation> {
        parse_endpoint(url)?;
        let result = self
            .rpc
            .json_rpc(url, "eth_chainId", json!([]))
            .await
            .map_err(|e| unreachable_endpoint(url, e))?;

        let hex_chain_id = result.as_str().filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::InvalidRpc(format!("{}: could not get chain ID for network", url))
        })?;
        let digits = hex_chain_id.trim_start_matches("0x");
        let chain_id = u64::from_str_radix(digits, 16)
            .map_err(|_| Error::InvalidChainId(hex_chain_id.to_string()))?;

        if !is_valid_chain_id_for_eth_networks(chain_id) {
            return Err(Error::InvalidChainId(hex_chain_id.to_string()));
        }
        let validation = validate_chain_id(&ChainIdInput::Text(hex_chain_id.to_string()));
        if !validation.valid {
            return Err(Error::InvalidChainId(hex_chain_id.to_string()));
        }

        let details = self.chains.chain(chain_id);
        let chain = details
            .and_then(|info| info.network)
            .unwrap_or("mainnet")
            .to_string();
        tracing::debug!(url, chain_id, chain = %chain, known = details.is_some(), "validated EVM endpoint");

        Ok(EthRpcValidation {
            valid: true,
            hex_chain_id: validation.hex_chain_id,
            chain_id,
            details,
            chain,
        })
    }

    /// Probe `data.url` and build an EVM [`Network`] from it.
    pub async fn get_eth_rpc(&self, data: &EthRpcRequest) -> Result<Network> {
        let validation = self.validate_eth_rpc(&data.url).await?;
        let details = validation.details;

        let currency = match (details, non_empty(&data.symbol)) {
            (Some(info), _) => info.symbol.to_lowercase(),
            (None, Some(symbol)) => symbol.to_lowercase(),
            (None, None) => return Err(Error::MustDefineSymbol(validation.chain_id)),
        };
        let label = non_empty(&data.label)
            .map(str::to_string)
            .or_else(|| details.map(|info| info.name.to_string()))
            .unwrap_or_default();
        let explorer = non_empty(&data.explorer)
            .map(str::to_string)
            .or_else(|| {
                details
                    .and_then(|info| info.explorers.first())
                    .map(|url| url.to_string())
            })
            .unwrap_or_default();

        Ok(Network {
            chain_id: validation.chain_id,
            label,
            url: data.url.clone(),
            api_url: data.api_url.clone().unwrap_or_default(),
            explorer,
            currency,
            default: false,
            slip44: None,
        })
    }

    // --- UTXO ----------------------------------------------------------------

    /// Resolve a SLIP-44 coin by name, or the shared testnet entry.
    pub fn get_bip44_chain(&self, coin: &str, is_testnet: bool) -> Result<Bip44Chain> {
        let mainnet = self.coins.by_name(mainnet_name(coin));
        let entry: Option<Bip44Coin> = if is_testnet {
            self.coins.testnet()
        } else {
            mainnet
        };
        let entry = entry.ok_or_else(|| Error::InvalidCoin(coin.to_string()))?;

        if !validate_chain_id(&ChainIdInput::Number(u64::from(entry.coin_type))).valid {
            return Err(Error::InvalidCoin(coin.to_string()));
        }
        let chain_id = u64::from(entry.coin_type & !HARDENED);
        if !validate_chain_id(&ChainIdInput::Text(format!("{:#x}", chain_id))).valid {
            return Err(Error::InvalidCoin(coin.to_string()));
        }

        let symbol = if is_testnet {
            let base = mainnet.map(|coin| coin.symbol).unwrap_or(entry.symbol);
            format!("t{}", base.to_lowercase())
        } else {
            entry.symbol.to_lowercase()
        };

        Ok(Bip44Chain {
            native_currency: NativeCurrency {
                name: coin.to_string(),
                symbol,
                decimals: UTXO_DECIMALS,
            },
            coin_type: entry.coin_type,
            chain_id,
        })
    }

    pub async fn validate_sys_rpc(&self, url: &str) -> Result<SysRpcValidation> {
        parse_endpoint(url)?;
        let status_url = format!("{}/api/v2", url.trim_end_matches('/'));
        let body = self
            .rpc
            .get_json(&status_url)
            .await
            .map_err(|e| unreachable_endpoint(url, e))?;

        let coin = text_at(&body, "/blockbook/coin")
            .ok_or_else(|| Error::InvalidRpc(format!("{}: missing blockbook.coin", url)))?;
        let chain = text_at(&body, "/backend/chain")
            .ok_or_else(|| Error::InvalidRpc(format!("{}: missing backend.chain", url)))?;
        tracing::debug!(url, coin = %coin, chain = %chain, "validated Blockbook endpoint");

        Ok(SysRpcValidation {
            valid: true,
            coin,
            chain,
        })
    }

    pub async fn get_bip44_network_details(&self, url: &str) -> Result<Bip44NetworkDetails> {
        let status = self.validate_sys_rpc(url).await?;
        let bip44 = self.get_bip44_chain(&status.coin, false)?;
        Ok(Bip44NetworkDetails { status, bip44 })
    }

    /// Probe `data.url` and build a UTXO [`Network`] from it.
    pub async fn get_sys_rpc(&self, data: &SysRpcRequest) -> Result<SysRpc> {
        let status = self.validate_sys_rpc(&data.url).await?;
        let bip44 = self.get_bip44_chain(&status.coin, status.chain == "test")?;
        let slip44 = u32::try_from(bip44.chain_id)
            .map_err(|_| Error::InvalidCoin(status.coin.clone()))?;

        let network = Network {
            chain_id: bip44.chain_id,
            label: non_empty(&data.label)
                .map(str::to_string)
                .unwrap_or_else(|| status.coin.clone()),
            url: data.url.clone(),
            api_url: data.url.clone(),
            explorer: data.url.clone(),
            currency: bip44.native_currency.symbol.clone(),
            default: false,
            slip44: Some(slip44),
        };
        Ok(SysRpc { network, bip44 })
    }
}

impl std::fmt::Debug for NetworkValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkValidator").finish_non_exhaustive()
    }
}

fn unreachable_endpoint(url: &str, error: Error) -> Error {
    match error {
        Error::RpcTimeout(_) | Error::InvalidRpc(_) => error,
        other => Error::InvalidRpc(format!("{}: {}", url, other)),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn text_at(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Blockbook names test backends `"<Coin> Testnet"`.
fn mainnet_name(coin: &str) -> &str {
    let coin = coin.trim();
    coin.strip_suffix(" Testnet").unwrap_or(coin)
}
