//! Error types for eth-transfer

use thiserror::Error;

/// Every failure is fatal: the command stops at the first error it sees.
#[derive(Error, Debug)]
pub enum EthTransferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error for {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("RPC error during {method}: {message}")]
    Rpc { method: &'static str, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Insufficient funds for transfer: {0}")]
    InsufficientFunds(String),

    #[error("Nonce conflict for nonce {nonce}: {message}")]
    NonceConflict { nonce: u64, message: String },

    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    #[error("Cancelled while waiting for {operation}")]
    Cancelled { operation: String },

    #[error("Transaction {tx_hash} reverted in block {block_number}")]
    Reverted { tx_hash: String, block_number: u64 },
}

impl EthTransferError {
    pub(crate) fn rpc(method: &'static str, err: impl std::fmt::Display) -> Self {
        EthTransferError::Rpc {
            method,
            message: err.to_string(),
        }
    }
}

/// Result type for eth-transfer operations
pub type EthTransferResult<T> = Result<T, EthTransferError>;
