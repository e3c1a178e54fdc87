use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use issuance::config::IssuanceConfig;
use issuance::currency;
use issuance::orchestrator::{IssuanceOrchestrator, IssuanceRequest};
use issuance::rippled::RippledConnector;
use issuance::{NetworkProfile, Secret};

#[derive(Parser)]
#[command(name = "issuance", version, about = "Issue tokens on the XRP Ledger")]
struct Cli {
    /// JSON config file; built-in defaults otherwise.
    #[arg(long, global = true, env = "ISSUANCE_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full issuance sequence and print the JSON result.
    #[command(name = "create-token")]
    CreateToken {
        #[arg(long, env = "ISSUER_SEED", hide_env_values = true)]
        issuer_seed: String,
        #[arg(long, env = "RECEIVER_SEED", hide_env_values = true)]
        receiver_seed: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        amount: String,
        #[arg(long, value_enum, default_value_t = NetworkProfile::Testnet)]
        network: NetworkProfile,
        /// Override the profile's ledger endpoint.
        #[arg(long)]
        endpoint: Option<String>,
    },
    #[command(name = "encode-currency")]
    EncodeCurrency { symbol: String },
    #[command(name = "decode-currency")]
    DecodeCurrency { code: String },
    /// Print the native balance of an address.
    Balance {
        #[arg(long)]
        address: String,
        #[arg(long, value_enum, default_value_t = NetworkProfile::Testnet)]
        network: NetworkProfile,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the effective configuration as JSON.
    #[command(name = "print-config")]
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::CreateToken {
            issuer_seed,
            receiver_seed,
            symbol,
            amount,
            network,
            endpoint,
        } => {
            let request = IssuanceRequest {
                issuer_secret: Secret::new(issuer_seed),
                receiver_secret: Secret::new(receiver_seed),
                token_symbol: symbol,
                token_amount: amount,
                network,
            };
            cmd_create_token(config, request, endpoint).await
        }
        Commands::EncodeCurrency { symbol } => {
            let code = currency::encode(&symbol).context("failed to encode symbol")?;
            println!("{code}");
            Ok(())
        }
        Commands::DecodeCurrency { code } => {
            println!("{}", currency::decode(&code));
            Ok(())
        }
        Commands::Balance {
            address,
            network,
            endpoint,
        } => cmd_balance(config, &address, network, endpoint).await,
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<IssuanceConfig> {
    match path {
        Some(path) => IssuanceConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(IssuanceConfig::default()),
    }
}

fn orchestrator(
    mut config: IssuanceConfig,
    network: NetworkProfile,
    endpoint: Option<String>,
) -> IssuanceOrchestrator {
    if let Some(endpoint) = endpoint {
        config.profile_mut(network).endpoint = Some(endpoint);
    }
    let connector = Arc::new(RippledConnector::new(config.rpc.clone()));
    IssuanceOrchestrator::new(connector, config)
}

async fn cmd_create_token(
    config: IssuanceConfig,
    request: IssuanceRequest,
    endpoint: Option<String>,
) -> Result<()> {
    let orchestrator = orchestrator(config, request.network, endpoint);
    let result = orchestrator.issue(request).await;
    println!("{}", serde_json::to_string_pretty(&result.to_response())?);
    if !result.success() {
        bail!("{}", result.message());
    }
    Ok(())
}

async fn cmd_balance(
    config: IssuanceConfig,
    address: &str,
    network: NetworkProfile,
    endpoint: Option<String>,
) -> Result<()> {
    let orchestrator = orchestrator(config, network, endpoint);
    match orchestrator
        .xrp_balance(network, address)
        .await
        .context("balance lookup failed")?
    {
        Some(balance) => println!("{balance}"),
        None => bail!("account {address} not found on {network}"),
    }
    Ok(())
}
