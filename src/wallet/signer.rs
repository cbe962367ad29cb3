//! Call-scoped signing key
//!
//! SECURITY: a `ScopedSigner` is the only place a decrypted account key
//! exists outside the vault.
//! - Built right before a signing or decryption call and dropped after it
//! - Never serialized, never logged
//! - Refuses to build if the key does not belong to the expected address

use crate::{Error, Result};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Signature, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use zeroize::Zeroizing;

/// Signing key for exactly one keyring call
pub struct ScopedSigner {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    secret: Zeroizing<[u8; 32]>,
}

impl ScopedSigner {
    /// Wrap a decrypted secp256k1 key that must control `expected`.
    pub(crate) fn new(secret: Zeroizing<[u8; 32]>, expected: Address) -> Result<Self> {
        let signer = PrivateKeySigner::from_slice(secret.as_slice())
            .map_err(|e| Error::Crypto(format!("Invalid private key: {}", e)))?;

        let address = signer.address();
        if address != expected {
            return Err(Error::Crypto(
                "decrypted key does not control the account address".to_string(),
            ));
        }

        Ok(Self {
            signer,
            address,
            secret,
        })
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest with no prefixing.
    pub fn sign_hash(&self, hash: &B256) -> Result<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| Error::Crypto(format!("Signing failed: {}", e)))
    }

    /// EIP-191 personal message signature
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| Error::Crypto(format!("Signing failed: {}", e)))
    }

    /// Sign a fully populated request, returning EIP-2718 bytes for broadcast.
    pub async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Vec<u8>> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| Error::transaction_failed("signing", e))?;
        Ok(envelope.encoded_2718())
    }

    /// Raw key bytes for the x25519 encryption keypair
    pub(crate) fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }
}

/// `0x` + r || s || v with `v` in {27, 28}
pub fn signature_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.as_bytes()))
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for ScopedSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSigner")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    // Test private key (DO NOT use in production!)
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    fn key() -> Zeroizing<[u8; 32]> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&hex::decode(TEST_KEY).unwrap());
        bytes
    }

    #[test]
    fn test_rejects_key_for_other_address() {
        let other = address!("0000000000000000000000000000000000000001");
        assert!(matches!(ScopedSigner::new(key(), other), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_personal_signature_recovers() {
        let signer = ScopedSigner::new(key(), TEST_ADDRESS).unwrap();
        let signature = signer.sign_message(b"hello").unwrap();

        assert_eq!(
            signature.recover_address_from_msg(b"hello").unwrap(),
            TEST_ADDRESS
        );
        let encoded = signature_hex(&signature);
        assert_eq!(encoded.len(), 2 + 130);
        assert!(encoded.ends_with("1b") || encoded.ends_with("1c"));
    }

    #[test]
    fn test_hash_signature_recovers() {
        let signer = ScopedSigner::new(key(), TEST_ADDRESS).unwrap();
        let hash = keccak256(b"payload");
        let signature = signer.sign_hash(&hash).unwrap();
        assert_eq!(signature.recover_address_from_prehash(&hash).unwrap(), TEST_ADDRESS);
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = ScopedSigner::new(key(), TEST_ADDRESS).unwrap();
        let debug_str = format!("{:?}", signer);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
