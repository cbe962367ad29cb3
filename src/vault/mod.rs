//! Password-gated secret storage
//!
//! `cipher` seals individual secrets; `store` owns the mnemonic and the
//! password record and persists them through a [`KeyValueStore`](crate::storage::KeyValueStore).

pub mod cipher;
mod store;

pub use cipher::{KdfParams, PasswordHash, SessionKey};
pub use store::{Rekey, VaultStore};
