//! Sender key loading and address derivation

use crate::error::{EthTransferError, EthTransferResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::info;

/// Parse a hex private key (with or without `0x`) into a signing wallet.
///
/// When `expected_from` is given, the address derived from the key must match
/// it.
pub fn load_wallet(private_key: &str, expected_from: Option<&str>) -> EthTransferResult<LocalWallet> {
    if private_key.trim().is_empty() {
        return Err(EthTransferError::Wallet(
            "No private key configured. Set wallet.private_key or ETH_TRANSFER_PRIVATE_KEY".to_string(),
        ));
    }

    let wallet = private_key
        .trim()
        .parse::<LocalWallet>()
        .map_err(|e| EthTransferError::Wallet(format!("Invalid private key: {}", e)))?;

    if let Some(expected) = expected_from {
        let expected = parse_address(expected)?;
        if expected != wallet.address() {
            return Err(EthTransferError::Wallet(format!(
                "Private key belongs to {:?}, not the configured sender {:?}",
                wallet.address(),
                expected
            )));
        }
    }

    info!("Loaded wallet {:?}", wallet.address());
    Ok(wallet)
}

/// Parse a hex address, accepting any checksum casing
pub fn parse_address(input: &str) -> EthTransferResult<Address> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| EthTransferError::Config(format!("Invalid address {:?}: {}", input, e)))
}
