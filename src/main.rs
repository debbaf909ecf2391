//! talker - a multi-user text chat server

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use talker::config::{Config, DEFAULT_CONFIG_PATH};
use talker::server::{ServerListener, ServerState};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "talker")]
#[command(about = "A multi-user text chat talker")]
#[command(version)]
struct Cli {
    /// Path to config file (JSON or TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(
        "Starting talker {} (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );
    tracing::info!("Loading config from {}", cli.config.display());
    let config = Config::load(&cli.config)?;
    tracing::info!(
        "Max users {}, login idle {} min, logins {}",
        config.max_users,
        config.login_idle_time,
        if config.stop_logins { "stopped" } else { "open" }
    );

    let state = Arc::new(ServerState::from_config(config)?);
    let listener = ServerListener::bind(state).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                tracing::error!("Unable to listen for shutdown signal: {}", e);
                // Dropping the sender would read as a shutdown
                std::future::pending::<()>().await;
            }
        }
    });

    listener.run(shutdown_rx).await
}
