//! Multi-chain HD keyring
//!
//! A password-gated BIP39 vault with derived accounts for EVM and
//! Syscoin-style UTXO networks:
//! - Seal the mnemonic and every account key under a password-derived key
//! - Derive, label and switch accounts and networks
//! - Sign messages, typed data and EIP-1559 transactions for the active account
//! - Validate new RPC and Blockbook endpoints before registering them
//!
//! # Security Model
//!
//! - Secrets are persisted only as AES-256-GCM ciphertext
//! - The session key lives in memory only while the keyring is unlocked
//! - Decrypted account keys exist only for the duration of one signing call
//! - `Debug` output of secret-bearing types is redacted

pub mod config;
pub mod keyring;
pub mod logging;
pub mod network;
pub mod provider;
pub mod rpc;
pub mod storage;
pub mod transactions;
pub mod vault;
pub mod wallet;

mod error;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::KeyringConfig;
pub use error::{Error, Result};
pub use keyring::{
    Account, AccountType, AccountView, KeyringManager, KeyringStatus, Network, NetworkFamily,
    WalletSnapshot,
};
pub use network::NetworkValidator;
pub use transactions::{EthereumTransactions, TransferRequest, TypedDataVersion};
pub use vault::VaultStore;
