//! Dynamic-fee transfer construction

use super::fees::FeeSuggestion;
use crate::error::{EthTransferError, EthTransferResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, U256};
use ethers::utils::parse_ether;

/// Everything needed to fill in a plain ETH transfer
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub chain_id: u64,
    pub nonce: U256,
    pub to: Address,
    /// In wei
    pub value: U256,
    pub gas_limit: u64,
    pub fees: FeeSuggestion,
}

/// Build an unsigned EIP-1559 transfer with no payload
pub fn build_transfer(params: &TransferParams) -> TypedTransaction {
    let tx = Eip1559TransactionRequest::new()
        .chain_id(params.chain_id)
        .nonce(params.nonce)
        .max_priority_fee_per_gas(params.fees.max_priority_fee_per_gas)
        .max_fee_per_gas(params.fees.max_fee_per_gas)
        .gas(params.gas_limit)
        .to(params.to)
        .value(params.value);

    TypedTransaction::Eip1559(tx)
}

/// Parse a decimal ether amount ("1", "0.25") into wei
pub fn parse_value(value_eth: &str) -> EthTransferResult<U256> {
    let value_eth = value_eth.trim();
    if value_eth.starts_with('-') {
        return Err(EthTransferError::Config(format!(
            "Transfer value must not be negative: {}",
            value_eth
        )));
    }

    parse_ether(value_eth).map_err(|e| {
        EthTransferError::Config(format!("Invalid transfer value {:?}: {}", value_eth, e))
    })
}
