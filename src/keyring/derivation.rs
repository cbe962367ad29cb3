//! HD key derivation per network family
//!
//! - EVM: `m/44'/60'/0'/0/{index}`, EIP-55 address of that node
//! - UTXO: `m/84'/{coin}'/{index}'` account node, `zpub` export, native
//!   segwit address of the first receive key (`/0/0`)

use crate::keyring::{Network, NetworkFamily};
use crate::{Error, Result};
use alloy::signers::local::PrivateKeySigner;
use bech32::{segwit, Hrp};
use bip32::{ChildNumber, DerivationPath, Prefix, XPrv, XPub};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use zeroize::Zeroizing;

/// Keys and address for one account index
pub struct DerivedAccount {
    pub address: String,
    pub xpub: String,
    /// Plaintext extended private key; seal before storing
    pub xprv: Zeroizing<String>,
}

impl std::fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("address", &self.address)
            .field("xpub", &self.xpub)
            .field("xprv", &"[REDACTED]")
            .finish()
    }
}

pub fn derivation_path(family: NetworkFamily, network: &Network, index: u32) -> String {
    match family {
        NetworkFamily::Ethereum => format!("m/44'/60'/0'/0/{}", index),
        NetworkFamily::Syscoin => format!("m/84'/{}'/{}'", network.coin_type(family), index),
    }
}

/// Derive account `index` from a BIP39 seed for `network`.
pub fn derive_account(
    seed: &[u8],
    family: NetworkFamily,
    network: &Network,
    index: u32,
) -> Result<DerivedAccount> {
    let path = DerivationPath::from_str(&derivation_path(family, network, index))
        .map_err(|e| Error::Crypto(format!("invalid derivation path: {}", e)))?;
    let node = XPrv::derive_from_path(seed, &path)
        .map_err(|e| Error::Crypto(format!("key derivation failed: {}", e)))?;

    match family {
        NetworkFamily::Ethereum => {
            let address = evm_address(&node.private_key().to_bytes())?;
            Ok(DerivedAccount {
                address,
                xpub: node.public_key().to_string(Prefix::XPUB),
                xprv: node.to_string(Prefix::XPRV),
            })
        }
        NetworkFamily::Syscoin => {
            let account_xpub = node.public_key();
            let address = segwit_address(&account_xpub, &network.currency)?;
            Ok(DerivedAccount {
                address,
                xpub: account_xpub.to_string(Prefix::ZPUB),
                xprv: node.to_string(Prefix::XPRV),
            })
        }
    }
}

/// Raw 32-byte secp256k1 key of an extended private key string.
pub fn private_key_bytes(xprv: &str) -> Result<Zeroizing<[u8; 32]>> {
    let node = XPrv::from_str(xprv)
        .map_err(|e| Error::Crypto(format!("invalid extended private key: {}", e)))?;
    let mut bytes = Zeroizing::new([0u8; 32]);
    bytes.copy_from_slice(&node.private_key().to_bytes());
    Ok(bytes)
}

fn evm_address(secret: &[u8]) -> Result<String> {
    let signer = PrivateKeySigner::from_slice(secret)
        .map_err(|e| Error::Crypto(format!("invalid secp256k1 key: {}", e)))?;
    Ok(signer.address().to_checksum(None))
}

fn segwit_address(account: &XPub, currency: &str) -> Result<String> {
    let receive = account
        .derive_child(ChildNumber::new(0, false).map_err(bip32_error)?)
        .and_then(|chain| chain.derive_child(ChildNumber::new(0, false)?))
        .map_err(bip32_error)?;

    let program = hash160(&receive.to_bytes());
    let hrp = Hrp::parse(&currency.to_ascii_lowercase())
        .map_err(|e| Error::Crypto(format!("invalid address prefix {}: {}", currency, e)))?;
    segwit::encode(hrp, segwit::VERSION_0, &program)
        .map_err(|e| Error::Crypto(format!("address encoding failed: {}", e)))
}

fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

fn bip32_error(e: bip32::Error) -> Error {
    Error::Crypto(format!("child derivation failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rpc;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn seed() -> [u8; 64] {
        bip39::Mnemonic::parse(PHRASE).unwrap().to_seed("")
    }

    fn eth_network() -> Network {
        rpc::default_networks()[&NetworkFamily::Ethereum][&1].clone()
    }

    #[test]
    fn test_evm_account_zero_matches_known_vector() {
        let account = derive_account(&seed(), NetworkFamily::Ethereum, &eth_network(), 0).unwrap();
        assert_eq!(account.address, "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
        assert!(account.xprv.starts_with("xprv"));
        assert!(account.xpub.starts_with("xpub"));
    }

    #[test]
    fn test_indices_produce_distinct_addresses() {
        let a = derive_account(&seed(), NetworkFamily::Ethereum, &eth_network(), 0).unwrap();
        let b = derive_account(&seed(), NetworkFamily::Ethereum, &eth_network(), 1).unwrap();
        assert_ne!(a.address, b.address);
        assert_eq!(b.address, "0x6Fac4D18c912343BF86fa7049364Dd4E424Ab9C0");
    }

    #[test]
    fn test_utxo_account_uses_bech32_and_zpub() {
        let network = rpc::syscoin_mainnet();
        let account = derive_account(&seed(), NetworkFamily::Syscoin, &network, 0).unwrap();
        assert!(account.address.starts_with("sys1q"));
        assert!(account.xpub.starts_with("zpub"));
        assert_eq!(derivation_path(NetworkFamily::Syscoin, &network, 2), "m/84'/57'/2'");
    }

    #[test]
    fn test_private_key_round_trips_through_xprv() {
        let account = derive_account(&seed(), NetworkFamily::Ethereum, &eth_network(), 0).unwrap();
        let key = private_key_bytes(&account.xprv).unwrap();
        assert_eq!(evm_address(key.as_slice()).unwrap(), account.address);
    }

    #[test]
    fn test_debug_redacts_xprv() {
        let account = derive_account(&seed(), NetworkFamily::Ethereum, &eth_network(), 0).unwrap();
        let debug = format!("{:?}", account);
        assert!(!debug.contains(account.xprv.as_str()));
    }
}
