//! Signing transfers and recovering their sender

use crate::error::{EthTransferError, EthTransferResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, H256};
use ethers::utils::keccak256;
use tracing::debug;

/// A transfer ready to broadcast
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub tx: TypedTransaction,
    pub signature: Signature,
    /// EIP-2718 envelope as sent with `eth_sendRawTransaction`
    pub raw: Bytes,
    pub hash: H256,
}

/// Sign `tx` with `wallet`, bound to the transaction's chain id so the
/// signature cannot be replayed on another chain
pub fn sign_transfer(wallet: &LocalWallet, tx: &TypedTransaction) -> EthTransferResult<SignedTransfer> {
    let chain_id = tx
        .chain_id()
        .ok_or_else(|| EthTransferError::Signing("transaction has no chain id".to_string()))?;

    let wallet = wallet.clone().with_chain_id(chain_id.as_u64());
    let signature = wallet
        .sign_transaction_sync(tx)
        .map_err(|e| EthTransferError::Signing(e.to_string()))?;

    let raw = tx.rlp_signed(&signature);
    let hash = H256::from(keccak256(&raw));
    debug!("Signed transaction {:?} ({} bytes)", hash, raw.len());

    Ok(SignedTransfer {
        tx: tx.clone(),
        signature,
        raw,
        hash,
    })
}

/// Address whose key produced the signature
pub fn recover_sender(signed: &SignedTransfer) -> EthTransferResult<Address> {
    signed
        .signature
        .recover(signed.tx.sighash())
        .map_err(|e| EthTransferError::Signing(format!("Signature recovery failed: {}", e)))
}
