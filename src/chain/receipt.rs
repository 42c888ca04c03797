//! Waiting for a broadcast transaction to be included in a block
//!
//! The wait is bounded by a deadline and can be cancelled; a node that never
//! mines the transaction does not hang the caller.

use crate::chain::ChainProvider;
use crate::config::ReceiptConfig;
use crate::error::{EthTransferError, EthTransferResult};

use ethers::providers::JsonRpcClient;
use ethers::types::{TransactionReceipt, H256, U64};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polls for a receipt until it has enough confirmations
pub struct ReceiptWaiter<'a, P> {
    provider: &'a ChainProvider<P>,
    /// Required confirmations, counting the inclusion block itself
    confirmations: u64,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a, P: JsonRpcClient> ReceiptWaiter<'a, P> {
    pub fn new(provider: &'a ChainProvider<P>, config: &ReceiptConfig, poll_interval: Duration) -> Self {
        Self {
            provider,
            confirmations: config.confirmations.max(1),
            poll_interval,
            timeout: config.timeout(),
        }
    }

    /// Wait for `tx_hash` to be mined.
    ///
    /// Fails with `Timeout` once the deadline passes and with `Cancelled` as
    /// soon as `cancel` fires.
    pub async fn wait(
        &self,
        tx_hash: H256,
        cancel: &CancellationToken,
    ) -> EthTransferResult<TransactionReceipt> {
        let operation = || format!("receipt of {:?}", tx_hash);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EthTransferError::Cancelled { operation: operation() }),
            _ = tokio::time::sleep(self.timeout) => Err(EthTransferError::Timeout { operation: operation() }),
            result = self.poll(tx_hash) => result,
        }
    }

    async fn poll(&self, tx_hash: H256) -> EthTransferResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.check(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One polling round: `Some` once the receipt is final enough
    async fn check(&self, tx_hash: H256) -> EthTransferResult<Option<TransactionReceipt>> {
        let receipt = match self.provider.transaction_receipt(tx_hash).await? {
            Some(receipt) => receipt,
            None => {
                debug!("Transaction {:?} not mined yet", tx_hash);
                return Ok(None);
            }
        };

        let block_number = match receipt.block_number {
            Some(block) => block.as_u64(),
            // Some nodes return receipts for pending transactions
            None => return Ok(None),
        };

        if receipt.status == Some(U64::zero()) {
            return Err(EthTransferError::Reverted {
                tx_hash: format!("{:?}", tx_hash),
                block_number,
            });
        }

        if self.confirmations > 1 {
            let current_block = self.provider.block_number().await?;
            if !confirmations_reached(block_number, current_block, self.confirmations) {
                debug!(
                    "Transaction {:?} has {} / {} confirmations",
                    tx_hash,
                    current_block.saturating_sub(block_number) + 1,
                    self.confirmations
                );
                return Ok(None);
            }
        }

        info!("Transaction {:?} included in block {}", tx_hash, block_number);
        Ok(Some(receipt))
    }
}

/// The inclusion block counts as the first confirmation
pub fn confirmations_reached(receipt_block: u64, current_block: u64, required: u64) -> bool {
    current_block.saturating_sub(receipt_block) + 1 >= required
}
