//! eth-transfer - query an Ethereum node and send a signed EIP-1559 transfer
//!
//! `inspect` reads chain id, nonces and the head block. `send` builds a plain
//! ETH transfer from fresh chain state, signs it locally, broadcasts it and
//! waits (bounded) for the receipt.

use anyhow::{Context, Result};
use clap::Parser;
use ethers::providers::JsonRpcClient;
use ethers::signers::Signer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod chain;
mod cli;
mod config;
mod error;
mod report;
mod tx;
mod wallet;

use chain::{ChainProvider, ReceiptWaiter, Transport};
use cli::{Cli, Commands};
use config::Settings;
use tx::TransferSender;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    info!("Starting eth-transfer v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply(&mut settings);
    settings.validate()?;

    let url = settings.rpc.url.clone();
    let request_timeout = settings.rpc.request_timeout();
    let poll_interval = settings.rpc.poll_interval();

    match Transport::detect(&url)? {
        Transport::Http => {
            let provider = ChainProvider::connect_http(&url, request_timeout, poll_interval)?;
            execute(&provider, &settings, &cli).await
        }
        Transport::Ws => {
            let provider = ChainProvider::connect_ws(&url, request_timeout, poll_interval).await?;
            execute(&provider, &settings, &cli).await
        }
        Transport::Ipc => {
            let provider = ChainProvider::connect_ipc(&url, request_timeout, poll_interval).await?;
            execute(&provider, &settings, &cli).await
        }
    }
}

async fn execute<P: JsonRpcClient>(
    provider: &ChainProvider<P>,
    settings: &Settings,
    cli: &Cli,
) -> Result<()> {
    match &cli.command {
        Commands::Inspect(_) => {
            let address = match &settings.inspect.address {
                Some(address) => wallet::parse_address(address)?,
                None => {
                    wallet::load_wallet(&settings.wallet.private_key, settings.wallet.from.as_deref())
                        .context("No inspect.address configured and no usable wallet key")?
                        .address()
                }
            };

            let snapshot = chain::inspect(provider, address, settings.inspect.nonce_block).await?;
            report::print_snapshot(&snapshot, cli.json)?;
        }
        Commands::Send(args) => {
            let wallet =
                wallet::load_wallet(&settings.wallet.private_key, settings.wallet.from.as_deref())?;
            let sender = TransferSender::new(provider, wallet, &settings.transfer)?;

            let chain_id = provider.chain_id().await?;
            let block_number = provider.block_number().await?;
            info!(
                "Connected to chain {} at block {}, sending from {:?}",
                chain_id,
                block_number,
                sender.from_address()
            );

            let signed = sender.prepare(chain_id).await?;
            if args.dry_run {
                report::print_dry_run(&signed, cli.json)?;
                return Ok(());
            }

            let cancel = CancellationToken::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    shutdown_signal().await;
                    info!("Shutdown signal received, abandoning receipt wait");
                    cancel.cancel();
                }
            });

            let waiter = ReceiptWaiter::new(provider, &settings.receipt, settings.rpc.poll_interval());
            let outcome = sender.submit(signed, &waiter, &cancel).await?;
            report::print_outcome(&outcome, settings.explorer_url.as_deref(), cli.json)?;
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,eth_transfer=debug,hyper=warn"));

    let json = std::env::var("ETH_TRANSFER_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout carries the report
    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
