use crate::config::Settings;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "eth-transfer",
    version,
    about = "Query an Ethereum node and send a signed EIP-1559 ETH transfer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to $ETH_TRANSFER_CONFIG, then config/default.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override rpc.url
    #[arg(long, global = true, env = "ETH_TRANSFER_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Print a JSON document instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print chain id, nonces and the latest block number
    Inspect(InspectArgs),
    /// Sign and broadcast a transfer, then wait for its receipt
    Send(SendArgs),
}

#[derive(Args, Debug, Default)]
pub struct InspectArgs {
    /// Account to inspect; defaults to the configured wallet
    #[arg(long)]
    pub address: Option<String>,

    /// Also report the nonce as of this block
    #[arg(long)]
    pub block: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct SendArgs {
    /// Override transfer.to
    #[arg(long)]
    pub to: Option<String>,

    /// Build and sign but do not broadcast
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.rpc_url {
            settings.rpc.url = url.clone();
        }

        match &self.command {
            Commands::Inspect(args) => {
                if let Some(address) = &args.address {
                    settings.inspect.address = Some(address.clone());
                }
                if let Some(block) = args.block {
                    settings.inspect.nonce_block = Some(block);
                }
            }
            Commands::Send(args) => {
                if let Some(to) = &args.to {
                    settings.transfer.to = to.clone();
                }
            }
        }
    }
}
