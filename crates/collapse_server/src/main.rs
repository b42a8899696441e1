//! Collapse match server.
//!
//! # Usage
//!
//! ```bash
//! # Default map on port 3000
//! cargo run -p collapse_server
//!
//! # Custom balance file and a fixed seed
//! cargo run -p collapse_server -- --config match.ron --seed 42 --port 4000
//! ```
//!
//! Logs go to stderr. `RUST_LOG` selects the filter unless `--verbose` is
//! given.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use collapse_core::config::GameConfig;
use collapse_server::ServerConfig;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "collapse_server")]
#[command(about = "Authoritative hex-grid combat server")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Game configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_game_config(cli: &Cli) -> anyhow::Result<GameConfig> {
    let mut game = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            GameConfig::from_ron_str(&text)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => GameConfig::default(),
    };
    if let Some(seed) = cli.seed {
        game.seed = seed;
    }
    Ok(game)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let game = load_game_config(&cli)?;
    let config = ServerConfig {
        bind: cli.bind,
        port: cli.port,
    };
    tracing::info!(
        addr = %config.addr(),
        radius = game.map.radius,
        tick_ms = game.updates.game_loop_tick,
        "Starting collapse server"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let sim = collapse_server::run_server(config, game, shutdown_rx).await?;
    tracing::info!(
        ticks = sim.get_tick(),
        winner = sim.winner().map(|t| t.as_str()),
        "Server stopped"
    );
    Ok(())
}
