//! Configuration for the keyring

pub mod rpc;

use crate::vault::KdfParams;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use rpc::default_networks;

/// Etherscan API key environment variable name
pub const ETHERSCAN_API_KEY_ENV: &str = "ETHERSCAN_API_KEY";
pub const RPC_TIMEOUT_ENV: &str = "KEYRING_RPC_TIMEOUT_SECS";
pub const STORAGE_PATH_ENV: &str = "KEYRING_STORAGE_PATH";

const DEFAULT_GAS_ORACLE_URL: &str = "https://api.etherscan.io/api?module=gastracker&action=gasoracle";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyringConfig {
    /// Upper bound on every provider and HTTP call (seconds)
    pub rpc_timeout_secs: u64,
    /// Gas oracle endpoint queried by `get_gas_oracle`
    pub gas_oracle_url: String,
    /// API key appended to gas oracle requests
    #[serde(skip)]
    pub etherscan_api_key: Option<SecretString>,
    /// Where `FileStore` keeps vault and wallet state
    pub storage_path: Option<PathBuf>,
    /// Argon2 cost for password hashing
    #[serde(default)]
    pub kdf: KdfParams,
}

impl KeyringConfig {
    /// Defaults overridden by `KEYRING_RPC_TIMEOUT_SECS`, `ETHERSCAN_API_KEY`
    /// and `KEYRING_STORAGE_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(RPC_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.rpc_timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "Ignoring invalid {}", RPC_TIMEOUT_ENV),
            }
        }
        if let Ok(key) = std::env::var(ETHERSCAN_API_KEY_ENV) {
            tracing::debug!("Using {} for gas oracle", ETHERSCAN_API_KEY_ENV);
            config.etherscan_api_key = Some(SecretString::from(key));
        }
        if let Ok(path) = std::env::var(STORAGE_PATH_ENV) {
            config.storage_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: 30,
            gas_oracle_url: DEFAULT_GAS_ORACLE_URL.to_string(),
            etherscan_api_key: None,
            storage_path: None,
            kdf: KdfParams::default(),
        }
    }
}
