//! Binary entry point for the proof-of-work token faucet.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use pow_faucet::config::FaucetConfig;
use pow_faucet::engine::BlockEngine;
use pow_faucet::handlers::{build_router, AppState};
use pow_faucet::payout::{PayoutDispatcher, PayoutSender};
use pow_faucet::storage::{SqliteStorage, Storage};

#[derive(Parser, Debug)]
#[command(name = "pow-faucet", about = "Proof-of-work token faucet server")]
struct Cli {
    /// Path to a TOML config file, layered under defaults and FAUCET_ env vars.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides the configured SQLite database path.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

/// Placeholder payout sender: logs and fabricates a transaction id. The real
/// on-chain submission path is out of scope here; operators wire their own
/// `PayoutSender` in before going to production.
struct LoggingPayoutSender;

#[async_trait::async_trait]
impl PayoutSender for LoggingPayoutSender {
    async fn send(&self, address: &str, net_amount_micro: u64) -> anyhow::Result<String> {
        tracing::info!(address, net_amount_micro, "dispatching payout (stub sender)");
        Ok(format!("stub-{}", uuid::Uuid::new_v4()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = FaucetConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.db_path)?);
    let engine = BlockEngine::boot(Arc::clone(&storage), config.clone())?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let engine_task = {
        let engine = Arc::clone(&engine);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { engine.run(shutdown_rx).await })
    };

    let payout_task = {
        let dispatcher = PayoutDispatcher::new(
            Arc::clone(&storage),
            Arc::new(LoggingPayoutSender),
            Duration::from_millis(config.payout_poll_interval_ms),
            config.payout_max_attempts,
        );
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { dispatcher.run(shutdown_rx).await })
    };

    let port = config.port;
    let state = Arc::new(AppState::new(Arc::clone(&engine), storage, config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "faucet listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    })
    .await?;

    let _ = engine_task.await;
    let _ = payout_task.await;

    Ok(())
}
