//! Password-derived symmetric encryption for vault secrets
//!
//! Argon2id turns the wallet password into a 256-bit key. The key never
//! touches storage: only `SHA-256(key)` and the salt are persisted, and the
//! key itself lives in a [`SessionKey`] while the vault is unlocked.
//! Secrets are sealed with AES-256-GCM and stored as hex `nonce || ciphertext`.
//!
//! Async callers derive keys through [`create_blocking`] and
//! [`verify_blocking`], which run Argon2id on tokio's blocking pool.

use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Password-derived key for the lifetime of an unlocked session.
///
/// Zeroized on drop. Not `Clone`.
pub struct SessionKey(SecretBox<[u8; 32]>);

impl SessionKey {
    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.expose_secret()))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Persisted password verification record (the `vault-keys` entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    salt: String,
    hash: String,
    kdf: KdfParams,
}

impl PasswordHash {
    /// Hash a new password under a fresh random salt.
    ///
    /// Returns the record to persist and the session key it protects.
    pub fn create(password: &str, kdf: KdfParams) -> Result<(Self, SessionKey)> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = derive_key(password, &salt, kdf)?;
        let record = Self {
            salt: hex::encode(salt),
            hash: hex::encode(Sha256::digest(key.as_slice())),
            kdf,
        };
        Ok((record, SessionKey(SecretBox::new(Box::new(*key)))))
    }

    /// Re-derive the session key if `password` matches this record.
    pub fn verify(&self, password: &str) -> Option<SessionKey> {
        let salt = hex::decode(&self.salt).ok()?;
        let expected = hex::decode(&self.hash).ok()?;
        let key = derive_key(password, &salt, self.kdf).ok()?;
        let actual = Sha256::digest(key.as_slice());

        if constant_time_eq(&expected, actual.as_slice()) {
            Some(SessionKey(SecretBox::new(Box::new(*key))))
        } else {
            None
        }
    }
}

/// [`PasswordHash::create`] on the blocking pool.
pub async fn create_blocking(password: &str, kdf: KdfParams) -> Result<(PasswordHash, SessionKey)> {
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || PasswordHash::create(&password, kdf))
        .await
        .map_err(|e| Error::Crypto(format!("key derivation task panicked: {}", e)))?
}

/// [`PasswordHash::verify`] on the blocking pool.
pub async fn verify_blocking(record: PasswordHash, password: &str) -> Result<Option<SessionKey>> {
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || record.verify(&password))
        .await
        .map_err(|e| Error::Crypto(format!("key derivation task panicked: {}", e)))
}

fn derive_key(password: &str, salt: &[u8], kdf: KdfParams) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| Error::Crypto(format!("invalid argon2 parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| Error::Crypto(format!("failed to derive key: {}", e)))?;
    Ok(key)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Encrypt `plaintext` under the session key.
pub fn encrypt_secret(plaintext: &[u8], key: &SessionKey) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| Error::Crypto(format!("encryption failed: {}", e)))?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(hex::encode(sealed))
}

/// Decrypt a value produced by [`encrypt_secret`].
pub fn decrypt_secret(sealed: &str, key: &SessionKey) -> Result<Zeroizing<Vec<u8>>> {
    let bytes = hex::decode(sealed)
        .map_err(|e| Error::Crypto(format!("ciphertext is not hex: {}", e)))?;
    if bytes.len() <= NONCE_LEN {
        return Err(Error::Crypto(format!(
            "ciphertext too short (expected more than {} bytes)",
            NONCE_LEN
        )));
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| Error::Crypto("decryption failed - wrong key".to_string()))
}

/// Decrypt a UTF-8 secret such as a mnemonic or an extended private key.
pub fn decrypt_string(sealed: &str, key: &SessionKey) -> Result<SecretString> {
    let plaintext = decrypt_secret(sealed, key)?;
    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| Error::Crypto("decrypted secret is not UTF-8".to_string()))?;
    Ok(SecretString::from(text.to_string()))
}

#[cfg(test)]
pub(crate) fn test_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
