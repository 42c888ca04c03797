//! Transfer sender: nonce and fee lookup, signing, broadcast and inclusion

use super::builder::{build_transfer, parse_value, TransferParams};
use super::fees::FeeEstimator;
use super::signer::{recover_sender, sign_transfer, SignedTransfer};
use crate::chain::{ChainProvider, ReceiptWaiter};
use crate::config::TransferConfig;
use crate::error::{EthTransferError, EthTransferResult};
use crate::wallet::parse_address;

use ethers::providers::JsonRpcClient;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, H256, U256};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A mined transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub tx_hash: H256,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub nonce: U256,
    pub receipt: TransactionReceipt,
}

/// Sends one plain ETH transfer from a local wallet
pub struct TransferSender<'a, P> {
    provider: &'a ChainProvider<P>,
    wallet: LocalWallet,
    to: Address,
    /// In wei
    value: U256,
    gas_limit: u64,
    fee_estimator: FeeEstimator,
}

impl<'a, P: JsonRpcClient> TransferSender<'a, P> {
    pub fn new(
        provider: &'a ChainProvider<P>,
        wallet: LocalWallet,
        config: &TransferConfig,
    ) -> EthTransferResult<Self> {
        let to = parse_address(&config.to)?;
        let value = parse_value(&config.value_eth)?;

        info!(
            "Transfer sender ready: {:?} -> {:?}, {} ETH",
            wallet.address(),
            to,
            config.value_eth
        );

        Ok(Self {
            provider,
            wallet,
            to,
            value,
            gas_limit: config.gas_limit,
            fee_estimator: FeeEstimator::new(config.fee_multiplier_percent),
        })
    }

    pub fn from_address(&self) -> Address {
        self.wallet.address()
    }

    /// Look up nonce and fees for `chain_id`, then build and sign the transfer
    pub async fn prepare(&self, chain_id: u64) -> EthTransferResult<SignedTransfer> {
        let from = self.wallet.address();

        let nonce = self.provider.pending_nonce(from).await?;
        info!("Pending nonce for {:?}: {}", from, nonce);

        let fees = self.fee_estimator.suggest(self.provider).await?;

        let balance = self.provider.balance(from).await?;
        let max_cost = fees.max_cost(self.gas_limit, self.value)?;
        if balance < max_cost {
            warn!(
                "Balance {} wei is below the maximum cost {} wei; the node may reject the transfer",
                balance, max_cost
            );
        } else {
            debug!("Balance {} wei covers maximum cost {} wei", balance, max_cost);
        }

        let tx = build_transfer(&TransferParams {
            chain_id,
            nonce,
            to: self.to,
            value: self.value,
            gas_limit: self.gas_limit,
            fees,
        });

        let signed = sign_transfer(&self.wallet, &tx)?;

        let signer = recover_sender(&signed)?;
        if signer != from {
            return Err(EthTransferError::Signing(format!(
                "Recovered signer {:?} does not match wallet {:?}",
                signer, from
            )));
        }

        Ok(signed)
    }

    /// Submit a signed transfer. Node rejections are classified but all fatal.
    pub async fn broadcast(&self, signed: &SignedTransfer) -> EthTransferResult<H256> {
        let nonce = signed.tx.nonce().map(|n| n.low_u64()).unwrap_or_default();

        let tx_hash = match self.provider.send_raw_transaction(signed.raw.clone()).await {
            Ok(hash) => hash,
            Err(EthTransferError::Rpc { message, .. }) => {
                return Err(classify_rejection(nonce, message));
            }
            Err(e) => return Err(e),
        };

        if tx_hash != signed.hash {
            warn!(
                "Node reported hash {:?}, expected {:?}",
                tx_hash, signed.hash
            );
        }

        info!("Transaction sent: {:?}", tx_hash);
        Ok(tx_hash)
    }

    /// Broadcast `signed` and wait for it to be mined
    pub async fn submit(
        &self,
        signed: SignedTransfer,
        waiter: &ReceiptWaiter<'_, P>,
        cancel: &CancellationToken,
    ) -> EthTransferResult<TransferOutcome> {
        let tx_hash = self.broadcast(&signed).await?;
        let receipt = waiter.wait(tx_hash, cancel).await?;

        Ok(TransferOutcome {
            tx_hash,
            from: self.wallet.address(),
            to: self.to,
            value: self.value,
            nonce: signed.tx.nonce().copied().unwrap_or_default(),
            receipt,
        })
    }
}

/// Map a node's rejection message onto an error variant
pub fn classify_rejection(nonce: u64, message: String) -> EthTransferError {
    let lower = message.to_lowercase();

    if lower.contains("insufficient funds") {
        EthTransferError::InsufficientFunds(message)
    } else if lower.contains("nonce too low")
        || lower.contains("nonce too high")
        || lower.contains("already known")
    {
        EthTransferError::NonceConflict { nonce, message }
    } else if lower.contains("underpriced") || lower.contains("less than block base fee") {
        EthTransferError::Underpriced(message)
    } else {
        EthTransferError::Rejected(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReceiptConfig, TRANSFER_GAS};
    use ethers::providers::{Http, JsonRpcError, Middleware, MockProvider, MockResponse, Provider};
    use ethers::types::transaction::eip2718::TypedTransaction;
    use ethers::utils::{rlp::Rlp, Anvil};
    use std::time::Duration;

    const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const RECIPIENT: &str = "0x4ed03F492CeD0487eEA9fd93eDf04A6896A83CC8";

    fn mocked() -> (ChainProvider<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::<MockProvider>::mocked();
        (
            ChainProvider::new("mock", provider, Duration::from_secs(5)),
            mock,
        )
    }

    fn transfer_config() -> TransferConfig {
        TransferConfig {
            to: RECIPIENT.to_string(),
            value_eth: "1".to_string(),
            gas_limit: TRANSFER_GAS,
            fee_multiplier_percent: 100,
        }
    }

    /// Queue the four reads `prepare` makes: nonce, tip cap, fee cap, balance.
    /// One value for all of them keeps the result independent of mock order.
    fn push_chain_state(mock: &MockProvider, value: U256) {
        for _ in 0..4 {
            mock.push::<U256, _>(value).unwrap();
        }
    }

    #[test]
    fn classifies_node_rejections() {
        assert!(matches!(
            classify_rejection(0, "insufficient funds for gas * price + value".into()),
            EthTransferError::InsufficientFunds(_)
        ));
        assert!(matches!(
            classify_rejection(3, "nonce too low: next nonce 5, tx nonce 3".into()),
            EthTransferError::NonceConflict { nonce: 3, .. }
        ));
        assert!(matches!(
            classify_rejection(3, "already known".into()),
            EthTransferError::NonceConflict { .. }
        ));
        assert!(matches!(
            classify_rejection(0, "replacement transaction underpriced".into()),
            EthTransferError::Underpriced(_)
        ));
        assert!(matches!(
            classify_rejection(0, "max fee per gas less than block base fee".into()),
            EthTransferError::Underpriced(_)
        ));
        assert!(matches!(
            classify_rejection(0, "intrinsic gas too low".into()),
            EthTransferError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn prepares_and_broadcasts_one_ether_transfer() {
        let (provider, mock) = mocked();
        let wallet = crate::wallet::load_wallet(KEY, None).unwrap();
        let from = wallet.address();
        let sender = TransferSender::new(&provider, wallet, &transfer_config()).unwrap();

        push_chain_state(&mock, U256::from(7));
        let signed = sender.prepare(11_155_111).await.unwrap();

        mock.assert_request(
            "eth_getTransactionCount",
            [serde_json::json!(from), serde_json::json!("pending")],
        )
        .unwrap();
        mock.assert_request("eth_maxPriorityFeePerGas", ()).unwrap();
        mock.assert_request("eth_gasPrice", ()).unwrap();
        mock.assert_request(
            "eth_getBalance",
            [serde_json::json!(from), serde_json::json!("latest")],
        )
        .unwrap();

        let (decoded, signature) = TypedTransaction::decode_signed(&Rlp::new(&signed.raw)).unwrap();
        let recipient: Address = RECIPIENT.parse().unwrap();
        assert!(matches!(decoded, TypedTransaction::Eip1559(_)));
        assert_eq!(decoded.to_addr(), Some(&recipient));
        assert_eq!(decoded.value(), Some(&U256::exp10(18)));
        assert_eq!(decoded.gas(), Some(&U256::from(TRANSFER_GAS)));
        assert_eq!(decoded.nonce(), Some(&U256::from(7)));
        assert_eq!(decoded.chain_id().map(|id| id.as_u64()), Some(11_155_111));
        assert_eq!(signature.recover(decoded.sighash()).unwrap(), from);

        mock.push::<H256, _>(signed.hash).unwrap();
        assert_eq!(sender.broadcast(&signed).await.unwrap(), signed.hash);
        mock.assert_request(
            "eth_sendRawTransaction",
            [serde_json::json!(signed.raw)],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn broadcast_classifies_node_rejection() {
        let (provider, mock) = mocked();
        let wallet = crate::wallet::load_wallet(KEY, None).unwrap();
        let sender = TransferSender::new(&provider, wallet, &transfer_config()).unwrap();

        push_chain_state(&mock, U256::from(3));
        let signed = sender.prepare(1).await.unwrap();

        mock.push_response(MockResponse::Error(JsonRpcError {
            code: -32000,
            message: "nonce too low: next nonce 5, tx nonce 3".to_string(),
            data: None,
        }));

        match sender.broadcast(&signed).await {
            Err(EthTransferError::NonceConflict { nonce, message }) => {
                assert_eq!(nonce, 3);
                assert!(message.contains("nonce too low"));
            }
            other => panic!("expected nonce conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_fees_fail_prepare() {
        let (provider, mock) = mocked();
        let wallet = crate::wallet::load_wallet(KEY, None).unwrap();
        let sender = TransferSender::new(&provider, wallet, &transfer_config()).unwrap();

        push_chain_state(&mock, U256::MAX / 2);

        assert!(matches!(
            sender.prepare(1).await,
            Err(EthTransferError::Rpc { .. })
        ));
    }

    #[test]
    fn rejects_bad_recipient() {
        let provider = ChainProvider::connect_http(
            "http://127.0.0.1:8545",
            Duration::from_secs(1),
            Duration::from_millis(100),
        )
        .unwrap();
        let wallet = crate::wallet::load_wallet(KEY, None).unwrap();
        let config = TransferConfig {
            to: "0xnot-an-address".to_string(),
            value_eth: "1".to_string(),
            gas_limit: TRANSFER_GAS,
            fee_multiplier_percent: 100,
        };

        assert!(matches!(
            TransferSender::new(&provider, wallet, &config),
            Err(EthTransferError::Config(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires the anvil binary"]
    async fn sends_one_ether_on_anvil() {
        let anvil = Anvil::new().spawn();
        let provider: ChainProvider<Http> = ChainProvider::connect_http(
            &anvil.endpoint(),
            Duration::from_secs(10),
            Duration::from_millis(50),
        )
        .unwrap();

        let wallet: LocalWallet = anvil.keys()[0].clone().into();
        let recipient = anvil.addresses()[1];
        let config = TransferConfig {
            to: format!("{:?}", recipient),
            value_eth: "1".to_string(),
            gas_limit: TRANSFER_GAS,
            fee_multiplier_percent: 100,
        };

        let sender = TransferSender::new(&provider, wallet, &config).unwrap();
        let chain_id = provider.chain_id().await.unwrap();
        let recipient_before = provider.balance(recipient).await.unwrap();

        let signed = sender.prepare(chain_id).await.unwrap();
        let waiter = ReceiptWaiter::new(
            &provider,
            &ReceiptConfig {
                timeout_secs: 30,
                confirmations: 1,
            },
            Duration::from_millis(50),
        );
        let outcome = sender
            .submit(signed, &waiter, &CancellationToken::new())
            .await
            .unwrap();

        assert_ne!(outcome.tx_hash, H256::zero());
        assert_eq!(outcome.receipt.transaction_hash, outcome.tx_hash);
        assert_eq!(outcome.receipt.to, Some(recipient));
        assert_eq!(outcome.receipt.from, sender.from_address());

        let mined = provider
            .inner()
            .get_transaction(outcome.tx_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mined.to, Some(recipient));
        assert_eq!(mined.value, U256::exp10(18));
        assert_eq!(mined.gas, U256::from(TRANSFER_GAS));

        let recipient_after = provider.balance(recipient).await.unwrap();
        assert_eq!(recipient_after - recipient_before, U256::exp10(18));
    }
}
