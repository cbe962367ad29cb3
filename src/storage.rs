//! Key-value persistence for vault and wallet state
//!
//! The keyring only needs `get`/`set`/`remove` over JSON values, plus
//! `set_all` for changes that span several entries. Two backends are
//! provided: an in-memory map and a single JSON document on disk.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Storage key for the password verification record
pub const VAULT_KEYS: &str = "vault-keys";
/// Storage key for the encrypted mnemonic
pub const VAULT: &str = "vault";
/// Storage key for the serialized wallet state
pub const WALLET_STATE: &str = "wallet-state";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Write every entry or none of them.
    fn set_all(&self, entries: Vec<(&str, Value)>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

fn poisoned<T>(_: T) -> Error {
    Error::Storage("storage lock poisoned".to_string())
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn set_all(&self, batch: Vec<(&str, Value)>) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        for (key, value) in batch {
            entries.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by one JSON object on disk.
///
/// Every write rewrites the whole file through a sibling temp file and a
/// rename, so a crash leaves either the old or the new document. On Unix the
/// file is restricted to the owner (0o600) since it holds ciphertext and
/// password hashes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Map<String, Value>>,
}

impl FileStore {
    /// Open a store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("failed to read {}: {}", path.display(), e)))?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(Error::Storage(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            tracing::info!(path = %path.display(), "keyring store not found, starting empty");
            Map::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, json).map_err(|e| {
            Error::Storage(format!("failed to write {}: {}", staging.display(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::Storage(format!("failed to set permissions: {}", e)))?;
        }

        std::fs::rename(&staging, &self.path).map_err(|e| {
            Error::Storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), keys = entries.len(), "keyring store saved");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn set_all(&self, batch: Vec<(&str, Value)>) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let mut next = entries.clone();
        for (key, value) in batch {
            next.insert(key.to_string(), value);
        }
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
