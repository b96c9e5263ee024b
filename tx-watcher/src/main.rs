//! Transaction Watcher CLI
//!
//! Polls a JSON-RPC node and serves matched transactions over HTTP.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tx_watcher::{
    api::{start_api_server, ApiState},
    metrics::WatcherMetrics,
    JsonRpcLedgerClient, QueryService, Scanner, WatchStore, WatcherConfig,
};

#[derive(Parser)]
#[command(name = "tx-watcher")]
#[command(about = "Watches a JSON-RPC node for transactions touching subscribed addresses")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scanner and the query API
    Run {
        /// JSON-RPC endpoint (overrides config)
        #[arg(long)]
        rpc_endpoint: Option<String>,

        /// API listen address (overrides config)
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Seconds between scans (overrides config)
        #[arg(long)]
        poll_interval_secs: Option<u64>,

        /// Number of matcher workers (overrides config)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Validate configuration file
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            if matches!(cli.command, Commands::ValidateConfig) {
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
            anyhow::bail!("Failed to load config from {:?}: {}", cli.config, e);
        }
    };

    match cli.command {
        Commands::Run {
            rpc_endpoint,
            listen,
            poll_interval_secs,
            workers,
        } => {
            let mut config = config;
            if let Some(endpoint) = rpc_endpoint {
                config.rpc_endpoint = endpoint;
            }
            if let Some(addr) = listen {
                config.listen_addr = addr;
            }
            if let Some(secs) = poll_interval_secs {
                config.poll_interval_secs = secs;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate()?;
            run_watcher(config).await
        }
        Commands::ValidateConfig => {
            println!("Configuration is valid.");
            println!("  RPC endpoint: {}", config.rpc_endpoint);
            println!("  Listen address: {}", config.listen_addr);
            println!("  Poll interval: {}s", config.poll_interval_secs);
            println!("  Workers: {}", config.workers);
            println!("  Request timeout: {}s", config.request_timeout_secs);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WatcherConfig> {
    match path {
        Some(path) => WatcherConfig::from_file(path),
        None => {
            let config = WatcherConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn run_watcher(config: WatcherConfig) -> Result<()> {
    tracing::info!("Starting transaction watcher against {}", config.rpc_endpoint);

    let store = Arc::new(WatchStore::new());
    let metrics = Arc::new(WatcherMetrics::new());
    let client = JsonRpcLedgerClient::new(&config.rpc_endpoint, config.request_timeout())?;

    let scanner = Arc::new(Scanner::new(
        client,
        store.clone(),
        config.workers,
        config.poll_interval(),
        metrics.clone(),
    ));

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received shutdown signal");
        handler_token.cancel();
    })?;

    let scanner_task = {
        let scanner = scanner.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scanner.run(cancel).await })
    };

    let state = Arc::new(ApiState::new(QueryService::new(store), metrics));
    let api_result = start_api_server(config.listen_addr, state, cancel.clone()).await;
    if let Err(e) = &api_result {
        tracing::error!("API server failed: {}", e);
    }

    // The scanner stops at its next tick boundary.
    cancel.cancel();
    scanner_task.await?;

    tracing::info!("Watcher stopped");
    api_result
}
