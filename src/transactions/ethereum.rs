//! Signing and transaction submission for the active EVM account
//!
//! Each operation decrypts the active account's key through
//! [`KeyringManager`] for the duration of one call. Address checks happen
//! before any decryption, fee and gas queries happen before the key is
//! produced, and the key is dropped before the broadcast is awaited.

use super::encryption::{self, EncryptedPayload};
use super::revert::parse_revert_reason;
use super::typed_data::{Eip712Hasher, TypedDataHasher, TypedDataVersion};
use super::units::{max_fee_per_gas, parse_units, FeeTier, FormattedGasPrice};
use crate::keyring::KeyringManager;
use crate::provider::{BlockTag, EvmProvider};
use crate::wallet::signature_hex;
use crate::{Error, Result};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

sol! {
    function transfer(address to, uint256 amount) external returns (bool);
}

const NATIVE_DECIMALS: u32 = 18;

/// ERC-20 leg of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub contract_address: String,
    pub decimals: u32,
}

/// Value transfer from the active account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub sender: String,
    pub receiver: String,
    /// Decimal amount in whole units, e.g. `"0.25"`
    pub amount: String,
    #[serde(default)]
    pub token: Option<TokenTransfer>,
}

/// EIP-1559 fee pair in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Fee tiers reported by the gas oracle, in gwei
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasOracle {
    #[serde(rename = "LastBlock")]
    pub last_block: String,
    #[serde(rename = "SafeGasPrice")]
    pub safe_gas_price: String,
    #[serde(rename = "ProposeGasPrice")]
    pub propose_gas_price: String,
    #[serde(rename = "FastGasPrice")]
    pub fast_gas_price: String,
    #[serde(rename = "suggestBaseFee", default)]
    pub suggest_base_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OracleEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

/// A broadcast transaction as it was signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub chain_id: u64,
    pub submitted_at: DateTime<Utc>,
}

impl SubmittedTransaction {
    fn new(hash: B256, from: Address, tx: &TransactionRequest) -> Self {
        Self {
            hash,
            from,
            to: tx.to.and_then(|kind| kind.to().copied()),
            nonce: tx.nonce.unwrap_or_default(),
            value: tx.value.unwrap_or_default(),
            data: tx.input.input().cloned().unwrap_or_default(),
            gas_limit: tx.gas.unwrap_or_default(),
            max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
            chain_id: tx.chain_id.unwrap_or_default(),
            submitted_at: Utc::now(),
        }
    }
}

/// EVM operations on behalf of the keyring's active account
#[derive(Clone)]
pub struct EthereumTransactions {
    keyring: KeyringManager,
    hasher: Arc<dyn TypedDataHasher>,
}

impl EthereumTransactions {
    pub fn new(keyring: KeyringManager) -> Self {
        Self::with_hasher(keyring, Arc::new(Eip712Hasher))
    }

    pub fn with_hasher(keyring: KeyringManager, hasher: Arc<dyn TypedDataHasher>) -> Self {
        Self { keyring, hasher }
    }

    // --- message signing ---------------------------------------------------

    /// EIP-191 `personal_sign`. `0x`-hex messages are signed as bytes.
    pub async fn sign_personal_message(&self, address: &str, message: &str) -> Result<String> {
        let payload = message_bytes(message);
        let signer = self.keyring.signer_for(address).await?;
        tracing::info!(address = %signer.address(), "signing personal message");
        Ok(signature_hex(&signer.sign_message(&payload)?))
    }

    /// Legacy `eth_sign`: the 32-byte hash is signed as-is.
    pub async fn eth_sign(&self, address: &str, hex_message: &str) -> Result<String> {
        self.keyring.ensure_active(address).await?;
        let bytes = decode_hex("message", hex_message)?;
        let hash = B256::try_from(bytes.as_slice())
            .map_err(|_| Error::InvalidInput("eth_sign expects a 32-byte hash".to_string()))?;

        let signer = self.keyring.signer_for(address).await?;
        tracing::info!(address = %signer.address(), "eth_sign");
        Ok(signature_hex(&signer.sign_hash(&hash)?))
    }

    pub async fn sign_typed_data(
        &self,
        address: &str,
        typed_data: &Value,
        version: TypedDataVersion,
    ) -> Result<String> {
        self.keyring.ensure_active(address).await?;
        let hash = self.hasher.hash(typed_data, version)?;

        let signer = self.keyring.signer_for(address).await?;
        tracing::info!(address = %signer.address(), ?version, "signing typed data");
        Ok(signature_hex(&signer.sign_hash(&hash)?))
    }

    /// Decode a hex personal message for display.
    pub fn parse_personal_message(&self, hex_message: &str) -> Result<String> {
        let bytes = decode_hex("message", hex_message)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::InvalidInput("message is not UTF-8".to_string()))
    }

    // --- encryption ----------------------------------------------------------

    /// Base64 x25519 public key of the active account
    pub async fn get_encrypted_pub_key(&self) -> Result<String> {
        let signer = self.keyring.active_signer().await?;
        tracing::info!(address = %signer.address(), "exporting encryption public key");
        Ok(encryption::encryption_public_key(signer.secret_bytes()))
    }

    pub async fn decrypt_message(&self, address: &str, encrypted: &str) -> Result<String> {
        self.keyring.ensure_active(address).await?;
        let payload = EncryptedPayload::parse(encrypted)?;

        let signer = self.keyring.signer_for(address).await?;
        tracing::info!(address = %signer.address(), "decrypting message");
        encryption::decrypt(signer.secret_bytes(), &payload)
    }

    // --- transactions --------------------------------------------------------

    /// Build, sign and broadcast a native or ERC-20 transfer.
    pub async fn send_transaction(&self, request: &TransferRequest) -> Result<SubmittedTransaction> {
        let from = self.keyring.ensure_active(&request.sender).await?;
        let receiver = parse_address("receiver", &request.receiver)?;

        let (to, value, data) = match &request.token {
            Some(token) => {
                let contract = parse_address("token contract", &token.contract_address)?;
                let amount = parse_units(&request.amount, token.decimals)?;
                let call = transferCall {
                    to: receiver,
                    amount,
                };
                (contract, U256::ZERO, Bytes::from(call.abi_encode()))
            }
            None => (
                receiver,
                parse_units(&request.amount, NATIVE_DECIMALS)?,
                Bytes::new(),
            ),
        };

        let provider = self.keyring.provider().await?;
        let nonce = provider
            .get_transaction_count(from, BlockTag::Pending)
            .await?;
        let fees = fee_data(provider.as_ref()).await?;
        let chain_id = provider.chain_id().await?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_value(value)
            .with_input(data)
            .with_nonce(nonce)
            .with_chain_id(chain_id)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let gas_limit = provider.estimate_gas(&tx).await.map_err(estimation_failed)?;
        let tx = tx.with_gas_limit(gas_limit);

        tracing::info!(
            from = %from,
            to = %to,
            nonce,
            gas_limit,
            max_fee_per_gas = fees.max_fee_per_gas,
            token = request.token.is_some(),
            "submitting transfer"
        );
        self.sign_and_broadcast(provider.as_ref(), from, tx).await
    }

    /// Sign and broadcast a request whose fee, gas and nonce fields are
    /// already populated.
    pub async fn send_formatted_transaction(
        &self,
        mut tx: TransactionRequest,
    ) -> Result<SubmittedTransaction> {
        let from = match tx.from {
            Some(from) => self.keyring.ensure_active(&from.to_string()).await?,
            None => self.keyring.active_address().await?,
        };
        tx.from = Some(from);

        let provider = self.keyring.provider().await?;
        tracing::info!(from = %from, nonce = ?tx.nonce, "submitting formatted transaction");
        self.sign_and_broadcast(provider.as_ref(), from, tx).await
    }

    async fn sign_and_broadcast(
        &self,
        provider: &dyn EvmProvider,
        from: Address,
        tx: TransactionRequest,
    ) -> Result<SubmittedTransaction> {
        let raw = {
            let signer = self.keyring.signer_for(&from.to_string()).await?;
            signer.sign_transaction(tx.clone()).await?
        };

        let hash = provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| match e {
                Error::RpcTimeout(_) => e,
                other => Error::transaction_failed("broadcast", other),
            })?;

        tracing::info!(hash = %hash, from = %from, "transaction broadcast");
        Ok(SubmittedTransaction::new(hash, from, &tx))
    }

    // --- fee and gas queries -------------------------------------------------

    /// Gas price scaled for `"low"` / `"high"`; any other name is unscaled.
    pub async fn get_fee_by_type(&self, kind: &str) -> Result<u128> {
        let gas_price = self.keyring.provider().await?.gas_price().await?;
        FeeTier::from_name(kind).apply(gas_price)
    }

    pub async fn get_fee_data_with_dynamic_max_priority_fee_per_gas(&self) -> Result<FeeData> {
        let provider = self.keyring.provider().await?;
        fee_data(provider.as_ref()).await
    }

    /// Pending-tag nonce for `address`
    pub async fn get_recommended_nonce(&self, address: &str) -> Result<u64> {
        let address = parse_address("address", address)?;
        self.keyring
            .provider()
            .await?
            .get_transaction_count(address, BlockTag::Pending)
            .await
    }

    /// Latest-tag nonce for `address`
    pub async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        let address = parse_address("address", address)?;
        self.keyring
            .provider()
            .await?
            .get_transaction_count(address, BlockTag::Latest)
            .await
    }

    /// Gas needed for a plain call to `to`
    pub async fn get_gas_limit(&self, to: &str) -> Result<u64> {
        let tx = TransactionRequest::default().with_to(parse_address("to", to)?);
        self.get_tx_gas_limit(&tx).await
    }

    pub async fn get_tx_gas_limit(&self, tx: &TransactionRequest) -> Result<u64> {
        self.keyring
            .provider()
            .await?
            .estimate_gas(tx)
            .await
            .map_err(estimation_failed)
    }

    /// Current gas price in wei
    pub async fn get_recommended_gas_price(&self) -> Result<u128> {
        self.keyring.provider().await?.gas_price().await
    }

    pub async fn get_recommended_gas_price_formatted(&self) -> Result<FormattedGasPrice> {
        Ok(FormattedGasPrice::from_wei(
            self.get_recommended_gas_price().await?,
        ))
    }

    /// Fee tiers from the configured gas oracle (Etherscan gastracker format)
    pub async fn get_gas_oracle(&self) -> Result<GasOracle> {
        let config = self.keyring.config();
        let mut url = config.gas_oracle_url.clone();
        if let Some(key) = &config.etherscan_api_key {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{}{}apikey={}", url, separator, key.expose_secret());
        }

        let body = self.keyring.rpc().get_json(&url).await?;
        let envelope: OracleEnvelope = serde_json::from_value(body)?;
        if envelope.status != "1" {
            let detail = envelope
                .result
                .as_str()
                .map(str::to_string)
                .unwrap_or(envelope.message);
            return Err(Error::Provider(format!("gas oracle: {}", detail)));
        }
        Ok(serde_json::from_value(envelope.result)?)
    }
}

impl std::fmt::Debug for EthereumTransactions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumTransactions")
            .field("keyring", &self.keyring)
            .finish_non_exhaustive()
    }
}

/// Latest block and priority fee, fetched together.
///
/// Chains without a base fee get zero for both fields.
async fn fee_data(provider: &dyn EvmProvider) -> Result<FeeData> {
    let (block, priority) = futures::join!(
        provider.get_block(BlockTag::Latest),
        provider.request("eth_maxPriorityFeePerGas", json!([])),
    );

    let base_fee = block?.and_then(|block| block.base_fee_per_gas);
    match base_fee {
        Some(base_fee) => {
            let priority_fee = quantity(&priority?)?;
            Ok(FeeData {
                max_fee_per_gas: max_fee_per_gas(base_fee, priority_fee)?,
                max_priority_fee_per_gas: priority_fee,
            })
        }
        None => Ok(FeeData {
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
        }),
    }
}

/// JSON-RPC quantity (`"0x…"` or a plain number)
fn quantity(value: &Value) -> Result<u128> {
    match value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u128::from_str_radix(digits, 16)
                .map_err(|e| Error::Provider(format!("bad quantity {}: {}", s, e)))
        }
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| Error::Provider(format!("bad quantity {}", n))),
        other => Err(Error::Provider(format!("bad quantity {}", other))),
    }
}

fn estimation_failed(error: Error) -> Error {
    match error {
        Error::Provider(message) => Error::transaction_rejected(format!(
            "gas estimation failed: {}",
            parse_revert_reason(&message)
        )),
        other => other,
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| Error::InvalidInput(format!("{} {}: {}", field, value, e)))
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    let body = value.trim();
    let body = body.strip_prefix("0x").unwrap_or(body);
    hex::decode(body).map_err(|e| Error::InvalidInput(format!("{} is not hex: {}", field, e)))
}

fn message_bytes(message: &str) -> Vec<u8> {
    match message.strip_prefix("0x").map(hex::decode) {
        Some(Ok(bytes)) => bytes,
        _ => message.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ACCOUNT_0};
    use alloy::consensus::transaction::SignerRecoverable;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{address, keccak256, Signature};
    use std::error::Error as _;

    const RECEIVER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    async fn setup() -> (Harness, EthereumTransactions) {
        let h = Harness::on_ethereum().await;
        let txs = EthereumTransactions::new(h.keyring.clone());
        (h, txs)
    }

    fn account() -> Address {
        Address::from_str(ACCOUNT_0).unwrap()
    }

    fn parse_signature(hex_sig: &str) -> Signature {
        Signature::try_from(hex::decode(&hex_sig[2..]).unwrap().as_slice()).unwrap()
    }

    fn broadcast(h: &Harness) -> TxEnvelope {
        let sent = h.provider.broadcast.lock().unwrap();
        assert_eq!(sent.len(), 1);
        TxEnvelope::decode_2718(&mut sent[0].as_slice()).unwrap()
    }

    fn native(amount: &str) -> TransferRequest {
        TransferRequest {
            sender: ACCOUNT_0.to_lowercase(),
            receiver: RECEIVER.to_string(),
            amount: amount.to_string(),
            token: None,
        }
    }

    #[tokio::test]
    async fn test_personal_signature_recovers_to_active_account() {
        let (_h, txs) = setup().await;
        let sig = txs.sign_personal_message(ACCOUNT_0, "hello").await.unwrap();
        assert_eq!(
            parse_signature(&sig).recover_address_from_msg("hello").unwrap(),
            account()
        );

        // hex input is signed as raw bytes
        let hex_sig = txs
            .sign_personal_message(ACCOUNT_0, "0x68656c6c6f")
            .await
            .unwrap();
        assert_eq!(hex_sig, sig);
    }

    #[tokio::test]
    async fn test_wrong_address_is_rejected() {
        let (_h, txs) = setup().await;
        let other = "0x0000000000000000000000000000000000000001";

        assert!(matches!(
            txs.sign_personal_message(other, "hello").await,
            Err(Error::WrongAddress(_))
        ));
        assert!(matches!(
            txs.eth_sign(other, &format!("{:#x}", B256::ZERO)).await,
            Err(Error::WrongAddress(_))
        ));
        assert!(matches!(
            txs.decrypt_message(other, "not even json").await,
            Err(Error::WrongAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_eth_sign_signs_the_raw_hash() {
        let (_h, txs) = setup().await;
        let hash = keccak256(b"payload");
        let sig = txs.eth_sign(ACCOUNT_0, &format!("{:#x}", hash)).await.unwrap();
        assert_eq!(
            parse_signature(&sig).recover_address_from_prehash(&hash).unwrap(),
            account()
        );

        assert!(matches!(
            txs.eth_sign(ACCOUNT_0, "0x1234").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_typed_data_signature_recovers() {
        let (_h, txs) = setup().await;
        let data = json!([{ "type": "string", "name": "message", "value": "Hi, Alice!" }]);
        let sig = txs
            .sign_typed_data(ACCOUNT_0, &data, TypedDataVersion::V1)
            .await
            .unwrap();

        let hash = Eip712Hasher.hash(&data, TypedDataVersion::V1).unwrap();
        assert_eq!(
            parse_signature(&sig).recover_address_from_prehash(&hash).unwrap(),
            account()
        );
    }

    #[tokio::test]
    async fn test_encrypted_messages_round_trip() {
        let (_h, txs) = setup().await;
        let public_key = txs.get_encrypted_pub_key().await.unwrap();
        let payload = encryption::encrypt(&public_key, "meet at noon").unwrap();
        let json = serde_json::to_string(&payload).unwrap();

        assert_eq!(
            txs.decrypt_message(ACCOUNT_0, &json).await.unwrap(),
            "meet at noon"
        );
    }

    #[test]
    fn test_parses_personal_messages() {
        let h = Harness::new();
        let txs = EthereumTransactions::new(h.keyring.clone());
        assert_eq!(txs.parse_personal_message("0x68656c6c6f").unwrap(), "hello");
        assert!(txs.parse_personal_message("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_native_transfer_is_signed_and_broadcast() {
        let (h, txs) = setup().await;
        let receipt = tokio_test::assert_ok!(txs.send_transaction(&native("1.5")).await);

        let envelope = broadcast(&h);
        assert_eq!(envelope.recover_signer().unwrap(), account());
        assert_eq!(envelope.nonce(), 7);
        assert_eq!(envelope.chain_id(), Some(1));
        assert_eq!(envelope.gas_limit(), 21_000);
        // 2 * 10 gwei + 1.5 gwei
        assert_eq!(envelope.max_fee_per_gas(), 21_500_000_000);
        assert_eq!(envelope.max_priority_fee_per_gas(), Some(1_500_000_000));
        assert_eq!(envelope.value(), U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(envelope.to(), Some(Address::from_str(RECEIVER).unwrap()));
        assert!(envelope.input().is_empty());

        assert_eq!(receipt.from, account());
        assert_eq!(receipt.nonce, 7);
        assert_eq!(receipt.hash, keccak256(&h.provider.broadcast.lock().unwrap()[0]));

        let requests = h.provider.requests.lock().unwrap();
        assert!(requests.contains(&"eth_getTransactionCount:pending".to_string()));
        // estimation saw the assembled transaction
        let estimated = h.provider.estimated.lock().unwrap();
        assert_eq!(estimated[0].nonce, Some(7));
        assert_eq!(estimated[0].max_fee_per_gas, Some(21_500_000_000));
    }

    #[tokio::test]
    async fn test_token_transfer_calls_the_contract() {
        let (h, txs) = setup().await;
        let request = TransferRequest {
            token: Some(TokenTransfer {
                contract_address: USDC.to_string(),
                decimals: 6,
            }),
            ..native("2.5")
        };
        txs.send_transaction(&request).await.unwrap();

        let envelope = broadcast(&h);
        assert_eq!(envelope.to(), Some(address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")));
        assert_eq!(envelope.value(), U256::ZERO);

        let call = transferCall::abi_decode(envelope.input()).unwrap();
        assert_eq!(call.to, Address::from_str(RECEIVER).unwrap());
        assert_eq!(call.amount, U256::from(2_500_000u64));
    }

    #[tokio::test]
    async fn test_fees_are_zero_without_base_fee() {
        let (h, txs) = setup().await;
        *h.provider.block.lock().unwrap() = Some(crate::provider::BlockSummary {
            number: 1,
            base_fee_per_gas: None,
        });

        let fees = txs
            .get_fee_data_with_dynamic_max_priority_fee_per_gas()
            .await
            .unwrap();
        assert_eq!(
            fees,
            FeeData {
                max_fee_per_gas: 0,
                max_priority_fee_per_gas: 0
            }
        );
    }

    #[tokio::test]
    async fn test_estimation_revert_is_reported_without_broadcast() {
        let (h, txs) = setup().await;
        *h.provider.gas_estimate.lock().unwrap() =
            Err("execution reverted: ERC20: transfer amount exceeds balance".to_string());

        let err = txs.send_transaction(&native("1")).await.unwrap_err();
        match err {
            Error::TransactionFailed { message, .. } => {
                assert!(message.contains("transfer amount exceeds balance"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(h.provider.broadcast.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_failure_keeps_the_cause() {
        let (h, txs) = setup().await;
        *h.provider.broadcast_error.lock().unwrap() = Some("nonce too low".to_string());

        let err = txs.send_transaction(&native("1")).await.unwrap_err();
        assert!(matches!(err, Error::TransactionFailed { .. }));
        assert!(err.source().unwrap().to_string().contains("nonce too low"));
    }

    #[tokio::test]
    async fn test_transfers_validate_inputs_first() {
        let (h, txs) = setup().await;
        let before = h.provider.requests.lock().unwrap().len();
        let bad_sender = TransferRequest {
            sender: RECEIVER.to_string(),
            ..native("1")
        };
        assert!(matches!(
            txs.send_transaction(&bad_sender).await,
            Err(Error::WrongAddress(_))
        ));
        assert!(matches!(
            txs.send_transaction(&native("1.2.3")).await,
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(h.provider.requests.lock().unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_formatted_transaction_is_sent_as_given() {
        let (h, txs) = setup().await;
        let tx = TransactionRequest::default()
            .with_to(Address::from_str(RECEIVER).unwrap())
            .with_value(U256::from(5u64))
            .with_nonce(3)
            .with_chain_id(1)
            .with_gas_limit(30_000)
            .with_max_fee_per_gas(40)
            .with_max_priority_fee_per_gas(2);

        let receipt = tokio_test::assert_ok!(txs.send_formatted_transaction(tx).await);
        assert_eq!(receipt.gas_limit, 30_000);

        let envelope = broadcast(&h);
        assert_eq!(envelope.nonce(), 3);
        assert_eq!(envelope.max_fee_per_gas(), 40);
        assert_eq!(envelope.recover_signer().unwrap(), account());
        assert!(!h
            .provider
            .requests
            .lock()
            .unwrap()
            .contains(&"eth_estimateGas".to_string()));
    }

    #[tokio::test]
    async fn test_fee_queries() {
        let (_h, txs) = setup().await;
        assert_eq!(txs.get_fee_by_type("low").await.unwrap(), 16_000_000_000);
        assert_eq!(txs.get_fee_by_type("high").await.unwrap(), 22_000_000_000);
        assert_eq!(txs.get_fee_by_type("standard").await.unwrap(), 20_000_000_000);

        let formatted = txs.get_recommended_gas_price_formatted().await.unwrap();
        assert_eq!(formatted.gwei, "20.00");
        assert_eq!(formatted.ether, "0.00000002");

        assert_eq!(txs.get_recommended_nonce(ACCOUNT_0).await.unwrap(), 7);
        assert_eq!(txs.get_transaction_count(ACCOUNT_0).await.unwrap(), 7);
        assert_eq!(txs.get_gas_limit(RECEIVER).await.unwrap(), 21_000);
    }

    #[tokio::test]
    async fn test_gas_oracle_reads_configured_endpoint() {
        let (h, txs) = setup().await;
        let url = h.keyring.config().gas_oracle_url.clone();
        h.rpc.on_get(
            &url,
            json!({
                "status": "1",
                "message": "OK",
                "result": {
                    "LastBlock": "19000000",
                    "SafeGasPrice": "12",
                    "ProposeGasPrice": "13",
                    "FastGasPrice": "15",
                    "suggestBaseFee": "11.5",
                    "gasUsedRatio": "0.5,0.4"
                }
            }),
        );

        let oracle = txs.get_gas_oracle().await.unwrap();
        assert_eq!(oracle.propose_gas_price, "13");
        assert_eq!(oracle.suggest_base_fee.as_deref(), Some("11.5"));
    }

    #[tokio::test]
    async fn test_utxo_network_cannot_sign_evm_transactions() {
        let h = Harness::with_vault().await;
        let txs = EthereumTransactions::new(h.keyring.clone());
        assert!(matches!(
            txs.get_recommended_gas_price().await,
            Err(Error::UnsupportedNetworkFamily { .. })
        ));
    }
}
