use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use issuance::api::{ApiServer, ApiState};
use issuance::config::IssuanceConfig;
use issuance::orchestrator::IssuanceOrchestrator;
use issuance::rippled::RippledConnector;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "issuanced", about = "XRPL token issuance HTTP service")]
struct Cli {
    #[arg(long, env = "ISSUANCE_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `api_addr` from the config file.
    #[arg(long)]
    api_addr: Option<String>,
    #[arg(long, env = "ISSUANCE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    /// rippled WebSocket URL for mainnet; overrides the config file.
    #[arg(long, env = "ISSUANCE_MAINNET_ENDPOINT")]
    mainnet_endpoint: Option<String>,
    /// rippled WebSocket URL for testnet; overrides the config file.
    #[arg(long, env = "ISSUANCE_TESTNET_ENDPOINT")]
    testnet_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => IssuanceConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => IssuanceConfig::default(),
    };
    if let Some(addr) = cli.api_addr {
        config.api_addr = addr.parse::<SocketAddr>().context("invalid api address")?;
    }
    if cli.api_token.is_some() {
        config.api_token = cli.api_token;
    }
    if let Some(endpoint) = cli.mainnet_endpoint {
        config.mainnet.endpoint = Some(endpoint);
    }
    if let Some(endpoint) = cli.testnet_endpoint {
        config.testnet.endpoint = Some(endpoint);
    }
    config
        .validate()
        .context("set both profile endpoints in the config file or with --mainnet-endpoint/--testnet-endpoint")?;

    let api_addr = config.api_addr;
    let auth_token = config.api_token.clone();
    let connector = Arc::new(RippledConnector::new(config.rpc.clone()));
    let orchestrator = IssuanceOrchestrator::new(connector, config);
    let server = ApiServer::start(api_addr, ApiState::new(orchestrator, auth_token))
        .await
        .context("failed to start issuance api")?;
    info!(api = %server.local_addr(), "issuanced online");
    signal::ctrl_c()
        .await
        .context("failed to install signal handler")?;
    info!("shutting down");
    server.shutdown().await?;
    Ok(())
}
