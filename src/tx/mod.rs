//! Transfer construction, signing and submission

pub mod builder;
pub mod fees;
pub mod sender;
pub mod signer;

pub use sender::{TransferOutcome, TransferSender};
pub use signer::SignedTransfer;
