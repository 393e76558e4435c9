//! Access Gate (v1)
//!
//! Sells access to a wallet address by paying a fixed amount of native
//! token from a custody account, then records the grant in Postgres.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   ACCESS GATE                     │
//!                         │                                                   │
//!   POST /execute-payment │  ┌────────┐   ┌───────────┐   ┌──────────────┐   │
//!   ──────────────────────┼─▶│  http  │──▶│ payments  │──▶│  blockchain  │───┼──▶ RPC node
//!                         │  │ server │   │ processor │   │ build/sign/  │   │
//!                         │  └───┬────┘   └─────┬─────┘   │ broadcast    │   │
//!                         │      │              │         └──────────────┘   │
//!   POST /verify-access   │      ▼              ▼                            │
//!   ──────────────────────┼─▶ access ───────▶ ledger ───────────────────────┼──▶ Postgres
//!                         │                     ▲                            │
//!                         │                     │                            │
//!                         │              reconciler (background)             │
//!                         │                                                   │
//!                         │  config · observability · lifecycle · admin       │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use access_gate::config::load_config;
use access_gate::lifecycle::{connect, shutdown_signal};
use access_gate::observability::{init_logging, metrics};
use access_gate::{HttpServer, Reconciler, Shutdown};

const DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "access-gate")]
#[command(about = "Payment-gated access service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("access-gate: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability.log_level, &config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "access-gate starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: access_gate::GateConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        chain_id = config.blockchain.chain_id,
        network = %config.blockchain.network_name,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = connect(&config).await?;

    let shutdown = Arc::new(Shutdown::new());
    let reconciler = Reconciler::new(state.processor.clone(), config.reconciliation.clone());
    let reconciler_task = tokio::spawn(reconciler.run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, state);
    let server_shutdown = shutdown.subscribe();

    let signal_shutdown = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let result = server.run(listener, server_shutdown).await;

    // Stop the reconciler even when the server exited on its own.
    signal_task.abort();
    shutdown.drain(vec![reconciler_task], DRAIN_GRACE).await;
    result?;
    Ok(())
}
