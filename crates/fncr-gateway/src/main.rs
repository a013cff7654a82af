//! fncr-gateway - Server-side proxy gateway binary.
//!
//! Listens on a local address and forwards every request to the FNCR
//! backend with the ambient session's bearer token attached.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fncr_api::{HttpClient, RefreshCoordinator, SessionFile, SessionManager, TokenStore};
use fncr_core::ApiUrl;
use fncr_gateway::{GatewayState, build_router};

/// Authenticated proxy gateway for the FNCR backend.
#[derive(Parser, Debug)]
#[command(name = "fncr-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Backend base URL requests are forwarded to
    #[arg(long)]
    backend: ApiUrl,

    /// Path to the persisted session file
    #[arg(long)]
    session_file: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.json_logs);

    let http = Arc::new(HttpClient::new(cli.backend.clone()));
    let file = Arc::new(SessionFile::new(cli.session_file));
    let store = Arc::new(TokenStore::new());
    let coordinator = Arc::new(RefreshCoordinator::new(http, store));
    let sessions = Arc::new(SessionManager::new(coordinator).with_store(file));

    let state = Arc::new(GatewayState::new(cli.backend, sessions));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(listen = %cli.listen, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
