//! Structured-data hashing for `eth_signTypedData`
//!
//! V3 and V4 follow EIP-712 (alloy's `TypedData`). V1 is the legacy
//! array-of-fields format: `keccak(keccak(schema) || keccak(packed values))`.

use crate::{Error, Result};
use alloy::dyn_abi::{DynSolType, TypedData};
use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedDataVersion {
    V1,
    V3,
    V4,
}

impl std::str::FromStr for TypedDataVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "V1" => Ok(TypedDataVersion::V1),
            "V3" => Ok(TypedDataVersion::V3),
            "V4" => Ok(TypedDataVersion::V4),
            other => Err(Error::InvalidInput(format!(
                "unsupported typed data version {}",
                other
            ))),
        }
    }
}

/// Produces the digest that gets signed for a typed-data request.
pub trait TypedDataHasher: Send + Sync {
    fn hash(&self, typed_data: &Value, version: TypedDataVersion) -> Result<B256>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Eip712Hasher;

#[derive(Debug, Deserialize)]
struct LegacyField {
    #[serde(rename = "type")]
    ty: String,
    name: String,
    value: Value,
}

impl Eip712Hasher {
    fn legacy_hash(fields: &[LegacyField]) -> Result<B256> {
        if fields.is_empty() {
            return Err(Error::InvalidInput("typed data has no fields".to_string()));
        }

        let mut schema = Vec::new();
        let mut packed = Vec::new();
        for field in fields {
            let ty: DynSolType = field
                .ty
                .parse()
                .map_err(|e| Error::InvalidInput(format!("type {}: {}", field.ty, e)))?;
            let value = ty
                .coerce_json(&field.value)
                .map_err(|e| Error::InvalidInput(format!("field {}: {}", field.name, e)))?;

            schema.extend_from_slice(format!("{} {}", field.ty, field.name).as_bytes());
            packed.extend_from_slice(&value.abi_encode_packed());
        }

        let mut outer = [0u8; 64];
        outer[..32].copy_from_slice(keccak256(&schema).as_slice());
        outer[32..].copy_from_slice(keccak256(&packed).as_slice());
        Ok(keccak256(outer))
    }
}

impl TypedDataHasher for Eip712Hasher {
    fn hash(&self, typed_data: &Value, version: TypedDataVersion) -> Result<B256> {
        // Wallet RPCs often pass the payload as a JSON string
        let parsed;
        let typed_data = match typed_data {
            Value::String(raw) => {
                parsed = serde_json::from_str::<Value>(raw)?;
                &parsed
            }
            other => other,
        };

        match version {
            TypedDataVersion::V1 => {
                let fields: Vec<LegacyField> = serde_json::from_value(typed_data.clone())?;
                Self::legacy_hash(&fields)
            }
            TypedDataVersion::V3 | TypedDataVersion::V4 => {
                let typed: TypedData = serde_json::from_value(typed_data.clone())?;
                typed
                    .eip712_signing_hash()
                    .map_err(|e| Error::InvalidInput(format!("typed data: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{b256, U256};
    use serde_json::json;

    fn mail() -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Person": [
                    { "name": "name", "type": "string" },
                    { "name": "wallet", "type": "address" }
                ],
                "Mail": [
                    { "name": "from", "type": "Person" },
                    { "name": "to", "type": "Person" },
                    { "name": "contents", "type": "string" }
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
                "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
                "contents": "Hello, Bob!"
            }
        })
    }

    #[test]
    fn test_v4_matches_eip712_reference_mail() {
        let hash = Eip712Hasher.hash(&mail(), TypedDataVersion::V4).unwrap();
        assert_eq!(
            hash,
            b256!("be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2")
        );
    }

    #[test]
    fn test_string_payload_is_accepted() {
        let raw = Value::String(mail().to_string());
        let from_string = Eip712Hasher.hash(&raw, TypedDataVersion::V3).unwrap();
        let from_object = Eip712Hasher.hash(&mail(), TypedDataVersion::V3).unwrap();
        assert_eq!(from_string, from_object);
    }

    #[test]
    fn test_v1_hash_composition() {
        let data = json!([
            { "type": "string", "name": "message", "value": "Hi, Alice!" },
            { "type": "uint256", "name": "value", "value": 42 }
        ]);

        let schema = keccak256("string messageuint256 value".as_bytes());
        let mut packed = b"Hi, Alice!".to_vec();
        packed.extend_from_slice(&U256::from(42).to_be_bytes::<32>());
        let values = keccak256(&packed);
        let mut outer = schema.to_vec();
        outer.extend_from_slice(values.as_slice());

        let hash = Eip712Hasher.hash(&data, TypedDataVersion::V1).unwrap();
        assert_eq!(hash, keccak256(&outer));
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        assert!(Eip712Hasher.hash(&json!([]), TypedDataVersion::V1).is_err());
        assert!(Eip712Hasher
            .hash(&json!([{ "type": "uint999", "name": "x", "value": 1 }]), TypedDataVersion::V1)
            .is_err());
        assert!(Eip712Hasher.hash(&json!({ "nope": 1 }), TypedDataVersion::V4).is_err());
        assert!("V2".parse::<TypedDataVersion>().is_err());
        assert_eq!("v4".parse::<TypedDataVersion>().unwrap(), TypedDataVersion::V4);
    }
}
