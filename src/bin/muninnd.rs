//! muninnd: the Muninn daemon.
//!
//! Serves the gateway's HTTP API for the chat UI.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use muninn::MuninnError;
use muninn::server::config::{Config, Secrets};
use muninn::server::{AppState, gateway_from_config, serve, spawn_cache_cleanup};

/// Muninn daemon, the LLM gateway HTTP service.
#[derive(Parser)]
#[command(name = "muninnd")]
#[command(version = muninn::PKG_VERSION)]
#[command(about = "Muninn LLM gateway daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Address to bind to, overriding the configuration.
    #[arg(short, long, env = "MUNINN_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("muninn=info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.server.address = address;
    }
    let secrets = Secrets::load(&config)?;

    let gateway = Arc::new(gateway_from_config(&config, &secrets)?);
    if gateway.providers().is_empty() {
        warn!("no provider has a usable API key, every request will get the degraded response");
    }

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| MuninnError::Configuration(format!("Invalid address: {e}")))?;

    let cleanup = spawn_cache_cleanup(gateway.clone(), config.cache.cleanup_interval());

    let listener = TcpListener::bind(addr).await?;
    info!(version = muninn::version_string(), %addr, "muninnd starting");

    serve(listener, AppState::new(gateway), shutdown_signal()).await?;

    if let Some(handle) = cleanup {
        handle.abort();
    }
    info!("muninnd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
