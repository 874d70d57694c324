//! regauth - Docker registry token authentication server
//!
//! This is the main entry point: it loads configuration, builds the signer
//! and the credential store client once, and serves the token endpoint.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use regauth::config::Config;
use regauth::server::{AppState, Server};
use regauth::token::Signer;
use regauth::vault::VaultClient;

/// regauth - Docker registry token authentication server
#[derive(Parser, Debug)]
#[command(name = "regauth")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "REGAUTH_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_file(&args.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting regauth");

    // Key loading and the algorithm check happen exactly once; any failure
    // here is fatal before the listener ever opens.
    let signer = Signer::from_config(&config.token)?;
    info!(
        algorithm = %config.token.algorithm,
        key_id = %signer.key_id(),
        issuer = %config.token.issuer,
        "Signing key loaded"
    );

    let vault = VaultClient::new(&config.vault);
    info!(endpoint = %config.vault.base_url(), "Credential store client ready");

    let state = AppState {
        signer: Arc::new(signer),
        vault: Arc::new(vault),
        handler_timeout: config.server.timeout(),
    };

    let server = Server::new(config.server.clone(), state);
    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("regauth shutdown complete");
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
