//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use tracing::{info, warn};
use undertow_core::config::UndertowConfig;
use undertow_core::torrent::LinkParser;
use undertow_core::{SimulatedEngine, TorrentPool};
use undertow_web::{AppState, run_server};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server backed by the simulated engine
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Seconds a torrent may sit idle before eviction
        #[arg(long)]
        idle_ttl: Option<u64>,
    },
    /// Print the info hash and normalized magnet URI for a link
    Resolve {
        /// Magnet URI, info hash or .torrent URL
        link: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the first failure of the selected command
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            config,
            host,
            port,
            idle_ttl,
        } => {
            let mut config = UndertowConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(idle_ttl) = idle_ttl {
                config.pool.idle_ttl_secs = idle_ttl;
            }
            config.validate()?;
            serve(config).await
        }
        Commands::Resolve { link } => resolve(&link).await,
    }
}

/// Runs the server until Ctrl-C, then releases every torrent.
///
/// # Errors
/// - Pool could not start or the listener failed
pub async fn serve(config: UndertowConfig) -> anyhow::Result<()> {
    let engine = Arc::new(SimulatedEngine::new(config.simulation.clone()));
    let pool = TorrentPool::start(&config, engine).context("Failed to start torrent pool")?;

    let served = run_server(
        &config.server,
        AppState::new(pool.registry()),
        shutdown_signal(),
    )
    .await;

    let stuck = pool.shutdown().await;
    if stuck > 0 {
        warn!(stuck, "Some torrents could not be released");
    }

    served.context("Server failed")
}

/// Resolves a link without touching any engine.
///
/// # Errors
/// - Link is not a magnet URI, info hash or reachable .torrent URL
pub async fn resolve(link: &str) -> anyhow::Result<()> {
    let config = UndertowConfig::load(None)?;
    let parser = LinkParser::new(&config.resolver)?;
    let parsed = parser.parse(link).await?;

    println!("Info hash: {}", parsed.info_hash);
    if let Some(name) = &parsed.name {
        println!("Name:      {name}");
    }
    for tracker in &parsed.trackers {
        println!("Tracker:   {tracker}");
    }
    println!("Magnet:    {}", parsed.magnet_uri);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
