//! Configuration management for eth-transfer
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gas consumed by a plain value transfer with no payload
pub const TRANSFER_GAS: u64 = 21_000;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const CONFIG_ENV: &str = "ETH_TRANSFER_CONFIG";

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub receipt: ReceiptConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
    /// Block explorer base URL, e.g. `https://sepolia.etherscan.io`
    #[serde(default)]
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// `http(s)://`, `ws(s)://` or a path to an IPC socket
    pub url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Only required by `send`
    #[serde(default)]
    pub private_key: String,
    /// Expected sender address; checked against the key when set
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Only required by `send`
    #[serde(default)]
    pub to: String,
    #[serde(default = "default_value_eth")]
    pub value_eth: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Applied to both node fee suggestions; 100 keeps them unchanged
    #[serde(default = "default_fee_multiplier_percent")]
    pub fee_multiplier_percent: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default = "default_receipt_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectConfig {
    /// Defaults to the wallet address when unset
    pub address: Option<String>,
    pub nonce_block: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_value_eth() -> String {
    "1".to_string()
}

fn default_gas_limit() -> u64 {
    TRANSFER_GAS
}

fn default_fee_multiplier_percent() -> u64 {
    100
}

fn default_receipt_timeout_secs() -> u64 {
    300
}

fn default_confirmations() -> u64 {
    1
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            to: String::new(),
            value_eth: default_value_eth(),
            gas_limit: default_gas_limit(),
            fee_multiplier_percent: default_fee_multiplier_percent(),
        }
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_receipt_timeout_secs(),
            confirmations: default_confirmations(),
        }
    }
}

impl RpcConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ReceiptConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load settings from `path`, falling back to `ETH_TRANSFER_CONFIG` and
    /// then `config/default.toml`. Not validated: command-line overrides are
    /// applied first, then `validate` is called.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => env::var(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(input: &str) -> Result<Self> {
        let settings = Self::parse(input)?;
        settings.validate()?;
        Ok(settings)
    }

    fn parse(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);
        toml::from_str(&config_str).with_context(|| "Failed to parse configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc.url.trim().is_empty() {
            anyhow::bail!("rpc.url must not be empty");
        }
        if self.rpc.poll_interval_ms == 0 {
            anyhow::bail!("rpc.poll_interval_ms must be greater than zero");
        }
        if self.rpc.request_timeout_secs == 0 {
            anyhow::bail!("rpc.request_timeout_secs must be greater than zero");
        }
        if self.transfer.gas_limit < TRANSFER_GAS {
            anyhow::bail!(
                "transfer.gas_limit {} is below the {} required for a transfer",
                self.transfer.gas_limit,
                TRANSFER_GAS
            );
        }
        if self.transfer.fee_multiplier_percent == 0 {
            anyhow::bail!("transfer.fee_multiplier_percent must be greater than zero");
        }
        if self.receipt.confirmations == 0 {
            anyhow::bail!("receipt.confirmations must be at least 1");
        }
        if self.receipt.timeout_secs == 0 {
            anyhow::bail!("receipt.timeout_secs must be greater than zero");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |cap: &regex::Captures<'_>| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
