//! Chain module - node connections and read-only chain state
//!
//! This module provides:
//! - Transport selection (HTTP, WebSocket or IPC) from the endpoint URL
//! - A typed provider with bounded requests
//! - Receipt polling with a deadline and cancellation

pub mod provider;
pub mod receipt;

pub use provider::ChainProvider;
pub use receipt::ReceiptWaiter;

use crate::error::{EthTransferError, EthTransferResult};

use ethers::providers::JsonRpcClient;
use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::info;

/// How to reach the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Ws,
    /// Local socket; only works on the same host as the node
    Ipc,
}

impl Transport {
    /// Pick a transport from the endpoint: `http(s)://`, `ws(s)://`, otherwise
    /// a filesystem path to an IPC socket
    pub fn detect(endpoint: &str) -> EthTransferResult<Self> {
        let endpoint = endpoint.trim();
        let lower = endpoint.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(Transport::Http)
        } else if lower.starts_with("ws://") || lower.starts_with("wss://") {
            Ok(Transport::Ws)
        } else if lower.contains("://") {
            Err(EthTransferError::Connection {
                endpoint: endpoint.to_string(),
                message: "unsupported URL scheme".to_string(),
            })
        } else if endpoint.is_empty() {
            Err(EthTransferError::Connection {
                endpoint: endpoint.to_string(),
                message: "empty endpoint".to_string(),
            })
        } else if looks_like_host_port(endpoint) {
            Err(EthTransferError::Connection {
                endpoint: endpoint.to_string(),
                message: "missing URL scheme, expected http:// or ws://".to_string(),
            })
        } else {
            Ok(Transport::Ipc)
        }
    }
}

/// `localhost:8545` or `10.0.0.1:8545`, as opposed to a socket path
fn looks_like_host_port(endpoint: &str) -> bool {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains(['/', '\\'])
                && !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Nonce of an account as of a historical block
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalNonce {
    pub block: u64,
    pub nonce: U256,
}

/// Point-in-time view of the chain from one account's perspective
#[derive(Debug, Clone, Serialize)]
pub struct ChainSnapshot {
    pub chain_id: u64,
    pub address: Address,
    pub nonce_at: Option<HistoricalNonce>,
    pub pending_nonce: U256,
    pub block_number: u64,
}

/// Query chain id, nonces and head block for `address`
pub async fn inspect<P: JsonRpcClient>(
    provider: &ChainProvider<P>,
    address: Address,
    nonce_block: Option<u64>,
) -> EthTransferResult<ChainSnapshot> {
    let chain_id = provider.chain_id().await?;
    info!("Connected to chain {} via {}", chain_id, provider.endpoint());

    let nonce_at = match nonce_block {
        Some(block) => {
            let nonce = provider.nonce_at(address, block).await?;
            Some(HistoricalNonce { block, nonce })
        }
        None => None,
    };

    let pending_nonce = provider.pending_nonce(address).await?;
    let block_number = provider.block_number().await?;

    Ok(ChainSnapshot {
        chain_id,
        address,
        nonce_at,
        pending_nonce,
        block_number,
    })
}
