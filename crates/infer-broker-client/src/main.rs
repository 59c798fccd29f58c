//! Diagnostics for an inference client setup: validates configuration,
//! checks RPC reachability and shows the persisted activation state.
//!
//! Chat and ledger commands need a broker SDK plugged in through
//! `BrokerFactory` and are exposed through the library, not this binary.

use infer_broker::wallet::probe_rpc;
use infer_broker::Wallet;
use infer_client::{ActivationStore, ComputeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,infer_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "check".to_string());
    if command != "check" {
        eprintln!("usage: infer-chat [check]");
        std::process::exit(2);
    }

    let config = match ComputeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let wallet = match Wallet::connect(&config.private_key, &config.rpc_url) {
        Ok(wallet) => wallet,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Identity:     {:#x}", wallet.address());
    println!("RPC endpoint: {}", config.rpc_url);

    match probe_rpc(&config.rpc_url).await {
        Ok(chain_id) => println!("Chain id:     {chain_id}"),
        Err(e) => {
            eprintln!("RPC unreachable: {e}");
            std::process::exit(1);
        }
    }

    let store = ActivationStore::open(config.state_path.clone());
    match store.path() {
        Some(path) => println!("State file:   {}", path.display()),
        None => println!("State file:   (in memory only)"),
    }

    let record = store.get(wallet.address(), &config.rpc_url);
    println!(
        "{}",
        serde_json::to_string_pretty(&record).unwrap_or_default()
    );
}
