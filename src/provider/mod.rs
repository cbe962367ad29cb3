//! EVM provider boundary
//!
//! Every chain read and every broadcast goes through [`EvmProvider`]. The
//! default implementation wraps an alloy HTTP provider and bounds each call
//! with the configured timeout.

use crate::keyring::Network;
use crate::{Error, Result};
use alloy::consensus::BlockHeader;
use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde_json::Value;
use std::borrow::Cow;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

/// Block tags the keyring asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

impl From<BlockTag> for BlockNumberOrTag {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockNumberOrTag::Latest,
            BlockTag::Pending => BlockNumberOrTag::Pending,
        }
    }
}

/// The parts of a block header fee math needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    /// Absent before the London fork
    pub base_fee_per_gas: Option<u128>,
}

#[async_trait]
pub trait EvmProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn get_transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64>;

    async fn get_block(&self, tag: BlockTag) -> Result<Option<BlockSummary>>;

    /// Raw JSON-RPC passthrough
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Broadcast an EIP-2718 encoded transaction, returning its hash.
    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256>;
}

/// Builds a provider for the active network.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, network: &Network) -> Result<Arc<dyn EvmProvider>>;
}

/// alloy HTTP provider with a per-call deadline
#[derive(Clone)]
pub struct HttpEvmProvider {
    inner: DynProvider,
    timeout: Duration,
}

impl HttpEvmProvider {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = crate::rpc::parse_endpoint(rpc_url)?;
        let inner = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { inner, timeout })
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: IntoFuture<Output = alloy::transports::TransportResult<T>>,
        F::IntoFuture: Send,
    {
        match tokio::time::timeout(self.timeout, fut.into_future()).await {
            Err(_) => {
                tracing::warn!(call = what, timeout_secs = self.timeout.as_secs(), "RPC call timed out");
                Err(Error::RpcTimeout(self.timeout.as_secs()))
            }
            Ok(result) => result.map_err(|e| Error::Provider(format!("{} failed: {}", what, e))),
        }
    }
}

impl std::fmt::Debug for HttpEvmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEvmProvider")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EvmProvider for HttpEvmProvider {
    async fn chain_id(&self) -> Result<u64> {
        self.bounded("eth_chainId", self.inner.get_chain_id()).await
    }

    async fn get_transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64> {
        let call = self
            .inner
            .get_transaction_count(address)
            .block_id(BlockId::Number(tag.into()));
        self.bounded("eth_getTransactionCount", call).await
    }

    async fn get_block(&self, tag: BlockTag) -> Result<Option<BlockSummary>> {
        let block = self
            .bounded("eth_getBlockByNumber", self.inner.get_block_by_number(tag.into()))
            .await?;
        Ok(block.map(|block| BlockSummary {
            number: block.header.number(),
            base_fee_per_gas: block.header.base_fee_per_gas().map(u128::from),
        }))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let method: Cow<'static, str> = Cow::Owned(method.to_string());
        self.bounded(
            "raw request",
            self.inner.raw_request::<Value, Value>(method, params),
        )
        .await
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.bounded("eth_estimateGas", self.inner.estimate_gas(tx.clone()))
            .await
    }

    async fn gas_price(&self) -> Result<u128> {
        self.bounded("eth_gasPrice", self.inner.get_gas_price()).await
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.bounded("eth_getBalance", self.inner.get_balance(address))
            .await
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256> {
        let pending = self
            .bounded(
                "eth_sendRawTransaction",
                self.inner.send_raw_transaction(encoded),
            )
            .await?;
        Ok(*pending.tx_hash())
    }
}

/// Connects [`HttpEvmProvider`]s using the network's `url`.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    timeout: Duration,
}

impl HttpProviderFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn connect(&self, network: &Network) -> Result<Arc<dyn EvmProvider>> {
        tracing::debug!(chain_id = network.chain_id, "connecting EVM provider");
        Ok(Arc::new(HttpEvmProvider::new(&network.url, self.timeout)?))
    }
}
