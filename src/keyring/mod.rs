//! HD keyring: accounts, networks and their lifecycle

pub mod derivation;
mod manager;
mod types;

pub use manager::KeyringManager;
pub use types::{
    Account, AccountMap, AccountType, AccountView, KeyringStatus, Network, NetworkFamily,
    NetworkMap, WalletSnapshot, WalletState,
};
