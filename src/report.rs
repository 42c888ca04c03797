//! Human-readable and JSON output on stdout

use crate::chain::ChainSnapshot;
use crate::tx::{SignedTransfer, TransferOutcome};

use anyhow::Result;
use ethers::types::H256;
use ethers::utils::format_ether;
use serde_json::json;
use std::fmt::Write;

pub fn print_snapshot(snapshot: &ChainSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        print!("{}", render_snapshot(snapshot));
    }
    Ok(())
}

pub fn print_dry_run(signed: &SignedTransfer, json: bool) -> Result<()> {
    let raw = format!("0x{}", hex::encode(&signed.raw));
    if json {
        let doc = json!({
            "tx_hash": signed.hash,
            "raw": raw,
            "transaction": signed.tx,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("Signed TX: {:?} (not broadcast)", signed.hash);
        println!("Raw: {}", raw);
    }
    Ok(())
}

pub fn print_outcome(outcome: &TransferOutcome, explorer_url: Option<&str>, json: bool) -> Result<()> {
    let link = explorer_url.map(|base| explorer_link(base, outcome.tx_hash));
    if json {
        let doc = json!({
            "tx_hash": outcome.tx_hash,
            "from": outcome.from,
            "to": outcome.to,
            "value": outcome.value,
            "nonce": outcome.nonce,
            "receipt": outcome.receipt,
            "explorer": link,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print!("{}", render_outcome(outcome, link.as_deref()));
    }
    Ok(())
}

fn render_snapshot(snapshot: &ChainSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ChainID: {}", snapshot.chain_id);
    if let Some(historical) = &snapshot.nonce_at {
        let _ = writeln!(
            out,
            "NonceAt: {} for {:?} at block {}",
            historical.nonce, snapshot.address, historical.block
        );
    }
    let _ = writeln!(out, "PendingNonce: {} for {:?}", snapshot.pending_nonce, snapshot.address);
    let _ = writeln!(out, "BlockNumber: {}", snapshot.block_number);
    out
}

fn render_outcome(outcome: &TransferOutcome, link: Option<&str>) -> String {
    let receipt = &outcome.receipt;
    let mut out = String::new();

    let _ = writeln!(out, "TX Hash: {:?}", outcome.tx_hash);
    let _ = writeln!(
        out,
        "Transfer: {} ETH {:?} -> {:?} (nonce {})",
        format_ether(outcome.value),
        outcome.from,
        outcome.to,
        outcome.nonce
    );
    if let (Some(number), Some(hash)) = (receipt.block_number, receipt.block_hash) {
        let _ = writeln!(out, "Block: {} ({:?})", number, hash);
    }
    if let Some(gas_used) = receipt.gas_used {
        let _ = writeln!(out, "Gas used: {}", gas_used);
    }
    if let Some(price) = receipt.effective_gas_price {
        let _ = writeln!(out, "Effective gas price: {} wei", price);
    }
    let status = match receipt.status.map(|s| s.as_u64()) {
        Some(1) => "success",
        Some(_) => "failed",
        None => "unknown",
    };
    let _ = writeln!(out, "Status: {}", status);
    if let Some(link) = link {
        let _ = writeln!(out, "TX {}", link);
    }
    out
}

fn explorer_link(base: &str, tx_hash: H256) -> String {
    format!("{}/tx/{:?}", base.trim_end_matches('/'), tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::HistoricalNonce;
    use ethers::types::{Address, TransactionReceipt, U256, U64};

    #[test]
    fn builds_explorer_link() {
        let hash = H256::repeat_byte(0x11);
        let link = explorer_link("https://sepolia.etherscan.io/", hash);
        assert_eq!(link, format!("https://sepolia.etherscan.io/tx/0x{}", "11".repeat(32)));
    }

    #[test]
    fn renders_snapshot_lines() {
        let snapshot = ChainSnapshot {
            chain_id: 5,
            address: Address::zero(),
            nonce_at: Some(HistoricalNonce {
                block: 7_916_447,
                nonce: U256::from(2),
            }),
            pending_nonce: U256::from(3),
            block_number: 8_000_000,
        };

        let text = render_snapshot(&snapshot);
        assert!(text.contains("ChainID: 5\n"));
        assert!(text.contains("NonceAt: 2 for"));
        assert!(text.contains("at block 7916447"));
        assert!(text.contains("PendingNonce: 3"));
        assert!(text.contains("BlockNumber: 8000000\n"));
    }

    #[test]
    fn renders_receipt_with_hash() {
        let tx_hash = H256::repeat_byte(0xaa);
        let outcome = TransferOutcome {
            tx_hash,
            from: Address::zero(),
            to: Address::repeat_byte(0x01),
            value: U256::exp10(18),
            nonce: U256::from(9),
            receipt: TransactionReceipt {
                transaction_hash: tx_hash,
                block_number: Some(U64::from(12u64)),
                block_hash: Some(H256::repeat_byte(0xbb)),
                gas_used: Some(U256::from(21_000u64)),
                status: Some(1u64.into()),
                ..Default::default()
            },
        };

        let text = render_outcome(&outcome, Some("https://etherscan.io/tx/0xaa"));
        assert!(text.starts_with(&format!("TX Hash: {:?}\n", tx_hash)));
        assert!(text.contains("Transfer: 1.0"));
        assert!(text.contains("Block: 12"));
        assert!(text.contains("Gas used: 21000"));
        assert!(text.contains("Status: success"));
        assert!(text.contains("TX https://etherscan.io/tx/0xaa"));
    }
}
