//! Encrypted mnemonic vault
//!
//! The vault owns the password verification record and the sealed mnemonic.
//! While unlocked it also holds the [`SessionKey`] that every account's
//! extended private key is sealed under.
//!
//! Once a mnemonic is sealed it is the vault's root. Phrases generated or
//! validated afterwards stay pending in memory until
//! [`commit_pending`](VaultStore::commit_pending) replaces the root.

use crate::storage::{KeyValueStore, VAULT, VAULT_KEYS};
use crate::vault::cipher::{self, KdfParams, PasswordHash, SessionKey};
use crate::{Error, Result};
use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use zeroize::Zeroize;

/// 128 bits of entropy gives a 12-word phrase
const SEED_ENTROPY_BYTES: usize = 16;

/// Persisted form of the `vault` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedVault {
    mnemonic: String,
}

/// A new password and the mnemonic resealed under it, not yet applied.
///
/// Built by [`VaultStore::rekey`]; the caller persists
/// [`entries`](Rekey::entries) together with anything else it resealed and
/// then hands the rekey back to [`VaultStore::apply`].
pub struct Rekey {
    record: PasswordHash,
    key: SessionKey,
    sealed_mnemonic: Option<String>,
    commits_pending: bool,
}

impl Rekey {
    /// Storage entries for the new password record and mnemonic.
    pub fn entries(&self) -> Result<Vec<(&'static str, Value)>> {
        let mut entries = vec![(VAULT_KEYS, serde_json::to_value(&self.record)?)];
        if let Some(sealed) = &self.sealed_mnemonic {
            entries.push((VAULT, sealed_entry(sealed)?));
        }
        Ok(entries)
    }
}

pub struct VaultStore {
    store: Arc<dyn KeyValueStore>,
    kdf: KdfParams,
    password: Option<PasswordHash>,
    session: Option<SessionKey>,
    sealed_mnemonic: Option<String>,
    /// A validated phrase not yet sealed as the vault's root
    pending_mnemonic: Option<SecretString>,
}

impl VaultStore {
    /// An empty vault backed by `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, kdf: KdfParams) -> Self {
        Self {
            store,
            kdf,
            password: None,
            session: None,
            sealed_mnemonic: None,
            pending_mnemonic: None,
        }
    }

    /// Restore the password record and sealed mnemonic from `store`.
    ///
    /// The vault comes back locked; call [`unlock`](Self::unlock) to use it.
    pub fn load(store: Arc<dyn KeyValueStore>, kdf: KdfParams) -> Result<Self> {
        let password = match store.get(VAULT_KEYS)? {
            Some(value) => Some(serde_json::from_value::<PasswordHash>(value)?),
            None => None,
        };
        let sealed_mnemonic = match store.get(VAULT)? {
            Some(value) => Some(serde_json::from_value::<SealedVault>(value)?.mnemonic),
            None => None,
        };

        tracing::debug!(
            has_password = password.is_some(),
            has_mnemonic = sealed_mnemonic.is_some(),
            "vault loaded"
        );

        Ok(Self {
            store,
            kdf,
            password,
            session: None,
            sealed_mnemonic,
            pending_mnemonic: None,
        })
    }

    pub fn password_record(&self) -> Option<&PasswordHash> {
        self.password.as_ref()
    }

    /// Set (or replace) the wallet password and open a session under it.
    pub fn set_wallet_password(&mut self, password: &str) -> Result<()> {
        let (record, key) = PasswordHash::create(password, self.kdf)?;
        let rekey = self.rekey(record, key)?;
        self.store.set_all(rekey.entries()?)?;
        self.apply(rekey);
        Ok(())
    }

    /// Prepare a password change without touching storage or the session.
    ///
    /// The sealed mnemonic is resealed under `key`. With no sealed mnemonic
    /// yet, a pending one is sealed and becomes the root on
    /// [`apply`](Self::apply).
    pub fn rekey(&self, record: PasswordHash, key: SessionKey) -> Result<Rekey> {
        let (plaintext, commits_pending) =
            match (&self.sealed_mnemonic, &self.session, &self.pending_mnemonic) {
                (Some(sealed), Some(previous), _) => (Some(cipher::decrypt_string(sealed, previous)?), false),
                (Some(_), None, _) => return Err(Error::InvalidPassword),
                (None, _, Some(pending)) => (Some(pending.clone()), true),
                (None, _, None) => (None, false),
            };
        let sealed_mnemonic = match plaintext {
            Some(phrase) => Some(cipher::encrypt_secret(phrase.expose_secret().as_bytes(), &key)?),
            None => None,
        };

        Ok(Rekey {
            record,
            key,
            sealed_mnemonic,
            commits_pending,
        })
    }

    /// Reseal a value sealed under the current session for `rekey`'s key.
    pub fn reseal(&self, sealed: &str, rekey: &Rekey) -> Result<String> {
        let plaintext = cipher::decrypt_secret(sealed, self.session()?)?;
        cipher::encrypt_secret(&plaintext, &rekey.key)
    }

    /// Switch to a prepared password once its entries are persisted.
    pub fn apply(&mut self, rekey: Rekey) {
        let Rekey {
            record,
            key,
            sealed_mnemonic,
            commits_pending,
        } = rekey;

        self.password = Some(record);
        self.session = Some(key);
        if sealed_mnemonic.is_some() {
            self.sealed_mnemonic = sealed_mnemonic;
        }
        if commits_pending {
            self.pending_mnemonic = None;
        }
        tracing::info!("wallet password set");
    }

    /// `true` iff `password` reproduces the stored verification hash.
    pub fn check_password(&self, password: &str) -> bool {
        self.password
            .as_ref()
            .is_some_and(|record| record.verify(password).is_some())
    }

    /// Generate a fresh 12-word mnemonic and stage it.
    pub fn create_seed(&mut self) -> Result<SecretString> {
        let mut entropy = [0u8; SEED_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut entropy);
        let generated = Mnemonic::from_entropy(&entropy)
            .map_err(|e| Error::Crypto(format!("failed to generate mnemonic: {}", e)));
        entropy.zeroize();

        let phrase = SecretString::from(generated?.to_string());
        self.stage_mnemonic(phrase.clone())?;
        tracing::info!("new seed phrase generated");
        Ok(phrase)
    }

    /// `true` iff `candidate` is a checksum-valid BIP39 phrase.
    ///
    /// A valid candidate is staged like a generated one.
    pub fn validate_seed(&mut self, candidate: &str) -> bool {
        let normalized = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
        if Mnemonic::parse(&normalized).is_err() {
            return false;
        }
        match self.stage_mnemonic(SecretString::from(normalized)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "valid seed could not be stored");
                false
            }
        }
    }

    /// Reveal the mnemonic after re-checking the password.
    pub fn get_seed(&self, password: &str) -> Result<SecretString> {
        let record = self.password.as_ref().ok_or(Error::InvalidPassword)?;
        let key = record.verify(password).ok_or(Error::InvalidPassword)?;
        self.reveal_seed(record, &key)
    }

    /// Decrypt the sealed mnemonic with a key already verified against `record`.
    pub fn reveal_seed(&self, record: &PasswordHash, key: &SessionKey) -> Result<SecretString> {
        if self.password.as_ref() != Some(record) {
            return Err(Error::InvalidPassword);
        }
        let sealed = self.sealed_mnemonic.as_ref().ok_or(Error::VaultNotInitialized)?;
        cipher::decrypt_string(sealed, key)
    }

    /// The sealed root mnemonic, decrypted under the current session.
    pub(crate) fn get_decrypted_mnemonic(&self) -> Result<SecretString> {
        let sealed = self.sealed_mnemonic.as_ref().ok_or(Error::InvalidSeed)?;
        cipher::decrypt_string(sealed, self.session()?)
    }

    /// Seal the pending phrase, if any, as the new root mnemonic.
    pub(crate) fn commit_pending(&mut self) -> Result<()> {
        let Some(phrase) = self.pending_mnemonic.take() else {
            return Ok(());
        };
        let sealed = cipher::encrypt_secret(phrase.expose_secret().as_bytes(), self.session()?)?;
        self.store.set(VAULT, sealed_entry(&sealed)?)?;
        self.sealed_mnemonic = Some(sealed);
        tracing::info!("pending seed committed to the vault");
        Ok(())
    }

    /// Re-open a session after [`load`](Self::load) or [`lock`](Self::lock).
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        let record = self.password.as_ref().ok_or(Error::VaultNotInitialized)?;
        let key = record.verify(password).ok_or(Error::InvalidPassword)?;
        let record = record.clone();
        self.open_session(&record, key)
    }

    /// Install a session key verified against `record`.
    ///
    /// Fails `InvalidPassword` if the password changed since `record` was read.
    pub fn open_session(&mut self, record: &PasswordHash, key: SessionKey) -> Result<()> {
        if self.password.as_ref() != Some(record) {
            return Err(Error::InvalidPassword);
        }
        self.session = Some(key);
        tracing::info!("vault unlocked");
        Ok(())
    }

    /// Drop the session key.
    pub fn lock(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("vault locked");
        }
    }

    /// Remove every persisted vault entry and forget all secrets.
    pub fn wipe(&mut self) -> Result<()> {
        self.store.remove(VAULT_KEYS)?;
        self.store.remove(VAULT)?;
        self.password = None;
        self.session = None;
        self.sealed_mnemonic = None;
        self.pending_mnemonic = None;
        tracing::warn!("vault wiped");
        Ok(())
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn has_mnemonic(&self) -> bool {
        self.sealed_mnemonic.is_some() || self.pending_mnemonic.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    /// Seal `plaintext` under the session key.
    pub(crate) fn seal(&self, plaintext: &[u8]) -> Result<String> {
        cipher::encrypt_secret(plaintext, self.session()?)
    }

    /// Open a value produced by [`seal`](Self::seal).
    pub(crate) fn open(&self, sealed: &str) -> Result<SecretString> {
        cipher::decrypt_string(sealed, self.session()?)
    }

    fn session(&self) -> Result<&SessionKey> {
        self.session.as_ref().ok_or(Error::VaultNotInitialized)
    }

    /// The first phrase staged under an open session becomes the root right
    /// away; later ones wait in `pending_mnemonic`.
    fn stage_mnemonic(&mut self, phrase: SecretString) -> Result<()> {
        match (&self.session, &self.sealed_mnemonic) {
            (Some(key), None) => {
                let sealed = cipher::encrypt_secret(phrase.expose_secret().as_bytes(), key)?;
                self.store.set(VAULT, sealed_entry(&sealed)?)?;
                self.sealed_mnemonic = Some(sealed);
                self.pending_mnemonic = None;
            }
            _ => self.pending_mnemonic = Some(phrase),
        }
        Ok(())
    }
}

fn sealed_entry(sealed: &str) -> Result<Value> {
    let record = SealedVault {
        mnemonic: sealed.to_string(),
    };
    Ok(serde_json::to_value(record)?)
}

impl std::fmt::Debug for VaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultStore")
            .field("has_password", &self.has_password())
            .field("has_mnemonic", &self.has_mnemonic())
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}
