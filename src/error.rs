//! Error types for the keyring

use thiserror::Error;

use crate::keyring::NetworkFamily;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid password.")]
    InvalidPassword,

    #[error("Invalid seed phrase")]
    InvalidSeed,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Signing for wrong address: {0}")]
    WrongAddress(String),

    #[error("Keyring vault is not initialized")]
    VaultNotInitialized,

    #[error("Keyring vault is already initialized")]
    VaultAlreadyInitialized,

    #[error("Invalid RPC: {0}")]
    InvalidRpc(String),

    #[error("Invalid chain ID: {0}")]
    InvalidChainId(String),

    #[error("Invalid coin: {0}")]
    InvalidCoin(String),

    #[error("Must define a symbol for chain {0}")]
    MustDefineSymbol(u64),

    #[error("Transaction failed: {message}")]
    TransactionFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("RPC request timed out after {0} seconds")]
    RpcTimeout(u64),

    #[error("Network {family}/{chain_id} not found")]
    NetworkNotFound { family: NetworkFamily, chain_id: u64 },

    #[error("Network {family}/{chain_id} cannot be removed: {reason}")]
    NetworkRemovalForbidden {
        family: NetworkFamily,
        chain_id: u64,
        reason: &'static str,
    },

    #[error("Operation requires an {expected} network, active network is {actual}")]
    UnsupportedNetworkFamily {
        expected: NetworkFamily,
        actual: NetworkFamily,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid argument: {0}")]
    InvalidInput(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a signing or broadcast failure, keeping the underlying cause.
    pub fn transaction_failed<E>(context: &str, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::TransactionFailed {
            message: format!("{}: {}", context, cause),
            source: Some(Box::new(cause)),
        }
    }

    /// A transaction failure with no underlying error value.
    pub fn transaction_rejected(message: impl Into<String>) -> Self {
        Error::TransactionFailed {
            message: message.into(),
            source: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
