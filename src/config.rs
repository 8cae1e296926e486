use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::str::FromStr;

pub const DEFAULT_DECIMALS: u8 = 18;
const DEFAULT_BATCH_SIZE: u64 = 1000; // Most public RPCs allow up to 1k logs per request
const DEFAULT_POLL_INTERVAL_SECS: u64 = 12;

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_urls: Vec<String>,
    pub token_addresses: Vec<Address>,
    pub database_url: String,
    pub start_block: Option<u64>,
    pub default_decimals: u8,
    /// Bridge proxy contract -> ERC20 it represents.
    pub bridge_token_aliases: HashMap<Address, Address>,
    pub batch_size: u64,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let json_rpc_urls = split_list(
            &std::env::var("JSON_RPC_URLS").context("JSON_RPC_URLS must be set in .env")?,
        );
        if json_rpc_urls.is_empty() {
            anyhow::bail!("JSON_RPC_URLS must contain at least one URL");
        }

        let token_addresses = parse_addresses(
            &std::env::var("TOKEN_ADDRESSES").context("TOKEN_ADDRESSES must be set in .env")?,
        )?;
        if token_addresses.is_empty() {
            anyhow::bail!("TOKEN_ADDRESSES must contain at least one address");
        }

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./accounting.db".to_string());

        let start_block = optional_var("START_BLOCK")?;
        let default_decimals = optional_var("DEFAULT_DECIMALS")?.unwrap_or(DEFAULT_DECIMALS);
        let batch_size = optional_var("BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        let poll_interval_secs =
            optional_var("POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let bridge_token_aliases = match std::env::var("BRIDGE_TOKEN_ALIASES") {
            Ok(raw) if !raw.trim().is_empty() => parse_aliases(&raw)?,
            _ => HashMap::new(),
        };

        Ok(Config {
            json_rpc_urls,
            token_addresses,
            database_url,
            start_block,
            default_decimals,
            bridge_token_aliases,
            batch_size: batch_size.max(1),
            poll_interval_secs,
        })
    }

    /// Contracts whose logs are fetched: the tokens plus any bridge proxies.
    pub fn watched_addresses(&self) -> Vec<Address> {
        let mut addresses = self.token_addresses.clone();
        for proxy in self.bridge_token_aliases.keys() {
            if !addresses.contains(proxy) {
                addresses.push(*proxy);
            }
        }
        addresses
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_addresses(raw: &str) -> Result<Vec<Address>> {
    split_list(raw)
        .iter()
        .map(|s| Address::from_str(s).with_context(|| format!("Invalid address: {s}")))
        .collect()
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {name}: {raw}"))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

/// `{"<proxy>": "<token>", ...}`
pub fn parse_aliases(raw: &str) -> Result<HashMap<Address, Address>> {
    let parsed: HashMap<String, String> =
        serde_json::from_str(raw).context("BRIDGE_TOKEN_ALIASES must be a JSON object of addresses")?;
    parsed
        .iter()
        .map(|(proxy, token)| {
            let proxy = Address::from_str(proxy).with_context(|| format!("Invalid bridge proxy: {proxy}"))?;
            let token = Address::from_str(token).with_context(|| format!("Invalid aliased token: {token}"))?;
            Ok((proxy, token))
        })
        .collect()
}
