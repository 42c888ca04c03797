//! EIP-1559 fee selection from node suggestions

use crate::chain::ChainProvider;
use crate::error::{EthTransferError, EthTransferResult};

use ethers::providers::JsonRpcClient;
use ethers::types::U256;
use serde::Serialize;
use tracing::{debug, warn};

/// Fee caps for a dynamic-fee transaction, in wei per gas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSuggestion {
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
}

impl FeeSuggestion {
    /// Nodes reject a fee cap below the tip cap, so the cap is raised to the
    /// tip when needed.
    pub fn new(max_priority_fee_per_gas: U256, max_fee_per_gas: U256) -> Self {
        let max_fee_per_gas = if max_fee_per_gas < max_priority_fee_per_gas {
            warn!(
                "Fee cap {} below tip cap {}, raising fee cap",
                max_fee_per_gas, max_priority_fee_per_gas
            );
            max_priority_fee_per_gas
        } else {
            max_fee_per_gas
        };

        Self {
            max_priority_fee_per_gas,
            max_fee_per_gas,
        }
    }

    /// Scale both caps by `percent` / 100, each from its own suggestion
    pub fn scaled(&self, percent: u64) -> EthTransferResult<Self> {
        let scale = |method: &'static str, fee: U256| {
            fee.checked_mul(U256::from(percent))
                .map(|scaled| scaled / 100)
                .ok_or_else(|| overflow(method, format!("{} scaled by {}%", fee, percent)))
        };

        Ok(Self::new(
            scale("eth_maxPriorityFeePerGas", self.max_priority_fee_per_gas)?,
            scale("eth_gasPrice", self.max_fee_per_gas)?,
        ))
    }

    /// Most the sender can be charged: `gas_limit * max_fee + value`
    pub fn max_cost(&self, gas_limit: u64, value: U256) -> EthTransferResult<U256> {
        U256::from(gas_limit)
            .checked_mul(self.max_fee_per_gas)
            .and_then(|gas_cost| gas_cost.checked_add(value))
            .ok_or_else(|| {
                overflow(
                    "eth_gasPrice",
                    format!("{} gas at {} wei plus {} wei", gas_limit, self.max_fee_per_gas, value),
                )
            })
    }
}

fn overflow(method: &'static str, what: String) -> EthTransferError {
    EthTransferError::rpc(method, format!("fee suggestion overflows 256 bits: {}", what))
}

/// Turns node fee suggestions into the caps used for a transfer
pub struct FeeEstimator {
    /// 100 = use the suggestions as-is
    multiplier_percent: u64,
}

impl FeeEstimator {
    pub fn new(multiplier_percent: u64) -> Self {
        Self { multiplier_percent }
    }

    /// Tip cap from `eth_maxPriorityFeePerGas`, fee cap from `eth_gasPrice`
    pub async fn suggest<P: JsonRpcClient>(
        &self,
        provider: &ChainProvider<P>,
    ) -> EthTransferResult<FeeSuggestion> {
        let tip_cap = provider.max_priority_fee().await?;
        let fee_cap = provider.gas_price().await?;

        let fees = FeeSuggestion::new(tip_cap, fee_cap).scaled(self.multiplier_percent)?;
        debug!("Fee suggestion: {:?}", fees);
        Ok(fees)
    }
}
