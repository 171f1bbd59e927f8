//! Trading engine runner.
//!
//! This is the main entry point for the intraday gap-continuation bot. It:
//! - Loads broker credentials from the environment
//! - Wires the broker adapter, market data provider, and coordinator
//! - Runs the engine until Ctrl+C
//!
//! # Usage
//!
//! ```bash
//! # Paper trading (default) with an explicit watchlist
//! cargo run --release -- AAPL TSLA NVDA
//!
//! # Live trading (real money)
//! cargo run --release -- --live AAPL TSLA
//! ```

use auth::ApiCredentials;
use broker::{BrokerEndpoints, BrokerHttpClient};
use engine::{Coordinator, EngineCommand, EngineConfig, MemoryStore, SharedStore};
use market_data::MarketDataProvider;
use metrics::create_metrics;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

fn print_usage() {
    eprintln!("Usage: gap-trader [OPTIONS] [SYMBOLS...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --live        Trade against the live API (real money)");
    eprintln!("  --paper       Trade against the paper API (default)");
    eprintln!("  --help        Show this help message");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  BROKER_API_KEY_ID     API key id for authenticated requests");
    eprintln!("  BROKER_API_SECRET     API secret");
    eprintln!("  RUST_LOG              Log filter (default: info)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  gap-trader AAPL TSLA NVDA         # paper-trade three symbols");
    eprintln!("  gap-trader --live AAPL            # live trading");
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    match dotenvy::dotenv() {
        Ok(path) => eprintln!("Loaded environment from: {}", path.display()),
        Err(dotenvy::Error::Io(_)) => {} // No .env file, that's fine
        Err(e) => eprintln!("Warning: failed to load .env file: {}", e),
    }

    common::init_logging();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut live = false;
    let mut watchlist = Vec::new();

    for arg in &args {
        match arg.as_str() {
            "--live" | "-l" => live = true,
            "--paper" | "-p" => live = false,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            s if s.starts_with('-') => {
                eprintln!("Unknown option: {}", s);
                print_usage();
                std::process::exit(1);
            }
            symbol => watchlist.push(symbol.to_ascii_uppercase()),
        }
    }

    if watchlist.is_empty() {
        warn!("no watchlist symbols supplied; the scanner will be idle until SetWatchlist");
    }

    let credentials = match ApiCredentials::from_env() {
        Ok(creds) => {
            info!(key_id = %creds.key_id(), "loaded API credentials");
            creds
        }
        Err(e) => {
            error!(error = %e, "credentials required: set BROKER_API_KEY_ID and BROKER_API_SECRET");
            std::process::exit(1);
        }
    };

    if live {
        warn!("live trading with REAL MONEY");
        warn!("press Ctrl+C within 5 seconds to abort...");
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    let endpoints = if live {
        BrokerEndpoints::live()
    } else {
        BrokerEndpoints::paper()
    };

    let config = EngineConfig::default();

    let broker = match BrokerHttpClient::new(
        endpoints,
        credentials,
        config.broker_rate_limit_per_min,
    ) {
        Ok(client) => Arc::new(client) as broker::SharedBroker,
        Err(e) => {
            error!(error = %e, "failed to build broker client");
            std::process::exit(1);
        }
    };

    let provider = Arc::new(MarketDataProvider::new(Arc::clone(&broker)));
    let store: SharedStore = Arc::new(MemoryStore::new());
    let metrics = create_metrics();

    info!(
        live = live,
        watchlist = ?watchlist,
        "starting gap trading engine"
    );

    let coordinator = Coordinator::new(
        config,
        broker,
        provider,
        store,
        metrics,
        watchlist,
    );

    let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ctrl+C -> graceful shutdown
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    // Keep the command channel alive for the engine's lifetime; an external
    // control layer would hold this sender.
    let _command_tx = command_tx;

    if let Err(e) = coordinator.run(command_rx, shutdown_rx).await {
        error!(error = %e, "engine stopped with error");
        std::process::exit(1);
    }

    info!("engine stopped");
}
