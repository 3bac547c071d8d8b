//! storefront-auth - Authentication and role-based authorization for a storefront back office
//!
//! This is the main entry point for the storefront-auth service.

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use storefront_auth::config::Config;
use storefront_auth::server::{build_state, Server};
use storefront_auth::telemetry::Telemetry;

/// storefront-auth - Authentication and role-based authorization for a storefront back office
#[derive(Parser, Debug)]
#[command(name = "storefront-auth")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "STOREFRONT_AUTH_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let telemetry = Telemetry::new(&config.otel)?;
    telemetry.install_subscriber(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        otel_export = telemetry.is_exporting(),
        "Starting storefront-auth"
    );

    let state = build_state(&config, telemetry.auth_metrics()).await?;

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    if let Err(e) = telemetry.shutdown() {
        error!(error = %e, "Failed to shutdown telemetry");
    }

    info!("storefront-auth shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file (plus env overrides) or environment alone
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path)
                .and_then(Config::with_env_overrides)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
