//! JSON-RPC provider wrapper with per-request timeouts

use crate::error::{EthTransferError, EthTransferResult};

use ethers::prelude::*;
use ethers::providers::{Http, Ipc, JsonRpcClient, Provider, Ws};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Typed access to the node calls a transfer needs.
///
/// Generic over the transport so the same calls run over HTTP, WebSocket,
/// IPC or a mocked client in tests.
pub struct ChainProvider<P> {
    /// Endpoint the provider was built from, for error messages
    endpoint: String,
    inner: Provider<P>,
    request_timeout: Duration,
}

impl ChainProvider<Http> {
    /// Build an HTTP provider. No request is sent until the first call.
    pub fn connect_http(
        url: &str,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> EthTransferResult<Self> {
        let provider = Provider::<Http>::try_from(url).map_err(|e| {
            EthTransferError::Connection {
                endpoint: url.to_string(),
                message: e.to_string(),
            }
        })?;
        debug!("Created HTTP provider for {}", url);

        Ok(Self::new(url, provider.interval(poll_interval), request_timeout))
    }
}

impl ChainProvider<Ws> {
    pub async fn connect_ws(
        url: &str,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> EthTransferResult<Self> {
        let provider = connect_bounded(url, request_timeout, Provider::<Ws>::connect(url)).await?;
        info!("WebSocket connected to {}", url);

        Ok(Self::new(url, provider.interval(poll_interval), request_timeout))
    }
}

impl ChainProvider<Ipc> {
    pub async fn connect_ipc(
        path: &str,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> EthTransferResult<Self> {
        let provider = connect_bounded(path, request_timeout, Provider::<Ipc>::connect_ipc(path)).await?;
        info!("IPC connected to {}", path);

        Ok(Self::new(path, provider.interval(poll_interval), request_timeout))
    }
}

async fn connect_bounded<T, E: Display>(
    endpoint: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> EthTransferResult<T> {
    match timeout(limit, fut).await {
        Ok(Ok(provider)) => Ok(provider),
        Ok(Err(e)) => Err(EthTransferError::Connection {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(EthTransferError::Timeout {
            operation: format!("connection to {}", endpoint),
        }),
    }
}

impl<P: JsonRpcClient> ChainProvider<P> {
    pub fn new(endpoint: &str, inner: Provider<P>, request_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            inner,
            request_timeout,
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &Provider<P> {
        &self.inner
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one RPC call under the request timeout
    async fn bounded<T, E: Display>(
        &self,
        method: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> EthTransferResult<T> {
        match timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EthTransferError::rpc(method, e)),
            Err(_) => Err(EthTransferError::Timeout {
                operation: method.to_string(),
            }),
        }
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> EthTransferResult<u64> {
        let chain_id = self.bounded("eth_chainId", self.inner.get_chainid()).await?;
        to_u64("eth_chainId", chain_id)
    }

    /// `eth_blockNumber`
    pub async fn block_number(&self) -> EthTransferResult<u64> {
        let block = self
            .bounded("eth_blockNumber", self.inner.get_block_number())
            .await?;
        Ok(block.as_u64())
    }

    /// Next nonce for `address`, counting transactions still in the mempool
    pub async fn pending_nonce(&self, address: Address) -> EthTransferResult<U256> {
        self.bounded(
            "eth_getTransactionCount",
            self.inner
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    /// Nonce of `address` as of `block`
    pub async fn nonce_at(&self, address: Address, block: u64) -> EthTransferResult<U256> {
        self.bounded(
            "eth_getTransactionCount",
            self.inner
                .get_transaction_count(address, Some(BlockNumber::Number(block.into()).into())),
        )
        .await
    }

    /// `eth_gasPrice`, used as the fee cap suggestion
    pub async fn gas_price(&self) -> EthTransferResult<U256> {
        self.bounded("eth_gasPrice", self.inner.get_gas_price()).await
    }

    /// `eth_maxPriorityFeePerGas`, used as the tip cap suggestion
    pub async fn max_priority_fee(&self) -> EthTransferResult<U256> {
        self.bounded(
            "eth_maxPriorityFeePerGas",
            self.inner.request::<_, U256>("eth_maxPriorityFeePerGas", ()),
        )
        .await
    }

    pub async fn balance(&self, address: Address) -> EthTransferResult<U256> {
        self.bounded("eth_getBalance", self.inner.get_balance(address, None))
            .await
    }

    /// Submit signed RLP bytes, returning the hash the node reports
    pub async fn send_raw_transaction(&self, raw: Bytes) -> EthTransferResult<H256> {
        let pending = self
            .bounded(
                "eth_sendRawTransaction",
                self.inner.send_raw_transaction(raw),
            )
            .await?;
        Ok(pending.tx_hash())
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> EthTransferResult<Option<TransactionReceipt>> {
        self.bounded(
            "eth_getTransactionReceipt",
            self.inner.get_transaction_receipt(tx_hash),
        )
        .await
    }
}

fn to_u64(method: &'static str, value: U256) -> EthTransferResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(EthTransferError::rpc(
            method,
            format!("value {} does not fit in u64", value),
        ));
    }
    Ok(value.as_u64())
}
