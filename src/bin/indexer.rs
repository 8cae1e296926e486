use anyhow::Result;
use clap::Parser;
use erc20_accounting::config::Config;
use erc20_accounting::repository::Database;
use erc20_accounting::rpc::RpcClient;
use erc20_accounting::scanner::Scanner;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "indexer")]
#[command(about = "Incremental ERC20 supply, holder and bridge accounting", long_about = None)]
struct Args {
    /// Stop once the chain head is reached instead of polling
    #[arg(long)]
    once: bool,

    /// Start block for contracts without recorded progress
    #[arg(long)]
    from_block: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Starting ERC20 accounting indexer");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("Tokens: {:?}", config.token_addresses);
    info!(
        "RPC URLs: {} endpoint(s) configured",
        config.json_rpc_urls.len()
    );
    if !config.bridge_token_aliases.is_empty() {
        info!("Bridge aliases: {:?}", config.bridge_token_aliases);
    }

    let db = Database::new(&config.database_url)?;
    info!("Database initialized");

    let client = RpcClient::new(&config.json_rpc_urls)?;
    info!("RPC client connected");

    let mut scanner = Scanner::new(client, db, &config).with_start_block(args.from_block);

    if let Err(e) = scanner.run(args.once).await {
        error!("Scanner error: {}", e);
        return Err(e);
    }

    Ok(())
}
