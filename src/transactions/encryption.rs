//! `eth_getEncryptionPublicKey` / `eth_decrypt` support
//!
//! The account's secp256k1 secret doubles as an x25519 secret. Messages are
//! sealed with `x25519-xsalsa20-poly1305` (NaCl box) and exchanged as a JSON
//! envelope with base64 fields, optionally hex-encoded as a whole.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use serde::{Deserialize, Serialize};

pub const ENCRYPTION_VERSION: &str = "x25519-xsalsa20-poly1305";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub version: String,
    pub nonce: String,
    pub ephem_public_key: String,
    pub ciphertext: String,
}

impl EncryptedPayload {
    /// Accept the envelope as JSON or as `0x`-prefixed hex of that JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.strip_prefix("0x") {
            Some(hex_body) => {
                let bytes = hex::decode(hex_body)
                    .map_err(|e| Error::InvalidInput(format!("encrypted payload is not hex: {}", e)))?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            None => Ok(serde_json::from_str(raw)?),
        }
    }
}

fn secret_key(secret: &[u8; 32]) -> SecretKey {
    SecretKey::from(*secret)
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| Error::InvalidInput(format!("{} is not base64: {}", field, e)))
}

/// Base64 x25519 public key for an account secret
pub fn encryption_public_key(secret: &[u8; 32]) -> String {
    STANDARD.encode(secret_key(secret).public_key().as_bytes())
}

/// Seal `message` for the holder of `recipient` (base64 x25519 key).
pub fn encrypt(recipient: &str, message: &str) -> Result<EncryptedPayload> {
    let recipient: [u8; 32] = decode_b64("public key", recipient)?
        .try_into()
        .map_err(|_| Error::InvalidInput("public key must be 32 bytes".to_string()))?;
    let ephemeral = SecretKey::generate(&mut OsRng);
    let salsa = SalsaBox::new(&PublicKey::from(recipient), &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);

    let ciphertext = salsa
        .encrypt(&nonce, message.as_bytes())
        .map_err(|e| Error::Crypto(format!("encryption failed: {}", e)))?;

    Ok(EncryptedPayload {
        version: ENCRYPTION_VERSION.to_string(),
        nonce: STANDARD.encode(nonce),
        ephem_public_key: STANDARD.encode(ephemeral.public_key().as_bytes()),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Open `payload` with the account secret.
pub fn decrypt(secret: &[u8; 32], payload: &EncryptedPayload) -> Result<String> {
    if payload.version != ENCRYPTION_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported encryption version {}",
            payload.version
        )));
    }

    let nonce = decode_b64("nonce", &payload.nonce)?;
    if nonce.len() != 24 {
        return Err(Error::InvalidInput("nonce must be 24 bytes".to_string()));
    }
    let ephemeral: [u8; 32] = decode_b64("ephemPublicKey", &payload.ephem_public_key)?
        .try_into()
        .map_err(|_| Error::InvalidInput("ephemPublicKey must be 32 bytes".to_string()))?;
    let ciphertext = decode_b64("ciphertext", &payload.ciphertext)?;

    let salsa = SalsaBox::new(&PublicKey::from(ephemeral), &secret_key(secret));
    let plaintext = salsa
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| Error::Crypto("decryption failed".to_string()))?;

    String::from_utf8(plaintext).map_err(|_| Error::Crypto("decrypted message is not UTF-8".to_string()))
}
