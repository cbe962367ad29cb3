//! In-process doubles for the provider and HTTP boundaries

use crate::config::KeyringConfig;
use crate::keyring::{KeyringManager, Network};
use crate::provider::{BlockSummary, BlockTag, EvmProvider, ProviderFactory};
use crate::rpc::RpcClient;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::vault::cipher::test_kdf;
use crate::{Error, Result};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
/// m/44'/60'/0'/0/0 of [`PHRASE`]
pub const ACCOUNT_0: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
pub const PASSWORD: &str = "P@ssw0rd1";

/// Scriptable EVM node
pub struct MockProvider {
    pub chain_id: u64,
    pub nonce: Mutex<u64>,
    pub block: Mutex<Option<BlockSummary>>,
    pub priority_fee: Mutex<u128>,
    pub gas_price: Mutex<u128>,
    pub balance: Mutex<U256>,
    /// `Err(message)` simulates a node-side estimation failure
    pub gas_estimate: Mutex<std::result::Result<u64, String>>,
    pub broadcast_error: Mutex<Option<String>>,
    pub estimated: Mutex<Vec<TransactionRequest>>,
    pub broadcast: Mutex<Vec<Vec<u8>>>,
    pub requests: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            nonce: Mutex::new(7),
            block: Mutex::new(Some(BlockSummary {
                number: 100,
                base_fee_per_gas: Some(10_000_000_000),
            })),
            priority_fee: Mutex::new(1_500_000_000),
            gas_price: Mutex::new(20_000_000_000),
            balance: Mutex::new(U256::from(1_500_000_000_000_000_000u128)),
            gas_estimate: Mutex::new(Ok(21_000)),
            broadcast_error: Mutex::new(None),
            estimated: Mutex::new(Vec::new()),
            broadcast: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, method: &str) {
        self.requests.lock().unwrap().push(method.to_string());
    }
}

#[async_trait]
impl EvmProvider for MockProvider {
    async fn chain_id(&self) -> Result<u64> {
        self.record("eth_chainId");
        Ok(self.chain_id)
    }

    async fn get_transaction_count(&self, _address: Address, tag: BlockTag) -> Result<u64> {
        self.record(match tag {
            BlockTag::Latest => "eth_getTransactionCount:latest",
            BlockTag::Pending => "eth_getTransactionCount:pending",
        });
        Ok(*self.nonce.lock().unwrap())
    }

    async fn get_block(&self, _tag: BlockTag) -> Result<Option<BlockSummary>> {
        self.record("eth_getBlockByNumber");
        Ok(*self.block.lock().unwrap())
    }

    async fn request(&self, method: &str, _params: Value) -> Result<Value> {
        self.record(method);
        match method {
            "eth_maxPriorityFeePerGas" => {
                Ok(json!(format!("{:#x}", *self.priority_fee.lock().unwrap())))
            }
            other => Err(Error::Provider(format!("unsupported method {}", other))),
        }
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.record("eth_estimateGas");
        self.estimated.lock().unwrap().push(tx.clone());
        self.gas_estimate
            .lock()
            .unwrap()
            .clone()
            .map_err(|message| Error::Provider(format!("eth_estimateGas failed: {}", message)))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.record("eth_gasPrice");
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn get_balance(&self, _address: Address) -> Result<U256> {
        self.record("eth_getBalance");
        Ok(*self.balance.lock().unwrap())
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256> {
        self.record("eth_sendRawTransaction");
        if let Some(message) = self.broadcast_error.lock().unwrap().clone() {
            return Err(Error::Provider(message));
        }
        self.broadcast.lock().unwrap().push(encoded.to_vec());
        Ok(alloy::primitives::keccak256(encoded))
    }
}

/// Hands out the same [`MockProvider`] for every network.
pub struct MockProviderFactory {
    pub provider: Arc<MockProvider>,
}

impl ProviderFactory for MockProviderFactory {
    fn connect(&self, _network: &Network) -> Result<Arc<dyn EvmProvider>> {
        Ok(self.provider.clone())
    }
}

/// Canned JSON-RPC and GET responses keyed by URL
#[derive(Default)]
pub struct MockRpcClient {
    rpc: Mutex<HashMap<(String, String), Value>>,
    get: Mutex<HashMap<String, Value>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockRpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_rpc(&self, url: &str, method: &str, result: Value) {
        self.rpc
            .lock()
            .unwrap()
            .insert((url.to_string(), method.to_string()), result);
    }

    pub fn on_get(&self, url: &str, body: Value) {
        self.get.lock().unwrap().insert(url.to_string(), body);
    }
}

#[async_trait]
impl RpcClient for MockRpcClient {
    async fn json_rpc(&self, url: &str, method: &str, _params: Value) -> Result<Value> {
        crate::rpc::parse_endpoint(url)?;
        self.calls.lock().unwrap().push(format!("{} {}", method, url));
        self.rpc
            .lock()
            .unwrap()
            .get(&(url.to_string(), method.to_string()))
            .cloned()
            .ok_or_else(|| Error::Provider(format!("connection refused: {}", url)))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        crate::rpc::parse_endpoint(url)?;
        self.calls.lock().unwrap().push(format!("GET {}", url));
        self.get
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Provider(format!("connection refused: {}", url)))
    }
}

/// `http://` URL of a listener that accepts connections and never answers.
pub async fn silent_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    format!("http://{}", address)
}

pub fn test_config() -> KeyringConfig {
    KeyringConfig {
        kdf: test_kdf(),
        ..KeyringConfig::default()
    }
}

/// Keyring wired to in-memory doubles
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub rpc: Arc<MockRpcClient>,
    pub keyring: KeyringManager,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockProvider::new(1));
        let rpc = Arc::new(MockRpcClient::new());
        let keyring = KeyringManager::new(
            store.clone() as Arc<dyn KeyValueStore>,
            Arc::new(MockProviderFactory {
                provider: provider.clone(),
            }),
            rpc.clone(),
            test_config(),
        );
        Self {
            store,
            provider,
            rpc,
            keyring,
        }
    }

    /// Password set, [`PHRASE`] sealed, account 0 derived.
    pub async fn with_vault() -> Self {
        let harness = Self::new();
        harness.keyring.set_wallet_password(PASSWORD).await.unwrap();
        assert!(harness.keyring.validate_seed(PHRASE).await);
        harness.keyring.create_keyring_vault().await.unwrap();
        harness
    }

    /// [`with_vault`](Self::with_vault) switched to Ethereum mainnet.
    pub async fn on_ethereum() -> Self {
        let harness = Self::with_vault().await;
        let network = harness.keyring.network(crate::keyring::NetworkFamily::Ethereum, 1).await.unwrap();
        harness
            .keyring
            .set_signer_network(&network, crate::keyring::NetworkFamily::Ethereum)
            .await
            .unwrap();
        harness
    }
}
