// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spoolgate — network print intake service over CUPS.
//
// Entry point. Initialises logging, loads configuration, and runs either the
// streaming TCP server (default) or a single stdin/stdout request in one-shot
// mode.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use spoolgate_core::config::AppConfig;
use spoolgate_print::PrintServer;

#[derive(Debug, Parser)]
#[command(name = "spoolgate", version, about = "Network print intake service")]
struct Cli {
    /// Path to a JSON configuration file. Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address for the streaming server.
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:6331")]
    listen: SocketAddr,

    /// Serve a single request on stdin/stdout instead of listening.
    #[arg(long)]
    oneshot: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => {
            let mut config = AppConfig::default();
            config.normalize();
            config
        }
    };

    let server = Arc::new(PrintServer::new(Arc::new(config)));

    if cli.oneshot {
        if let Err(e) = server
            .serve_once(tokio::io::stdin(), tokio::io::stdout())
            .await
        {
            error!(error = %e, "one-shot request failed");
            std::process::exit(1);
        }
        return;
    }

    let listener = match TcpListener::bind(cli.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %cli.listen, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    let shutdown_handle = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received — shutting down");
            shutdown_handle.shutdown();
        }
    });

    if let Err(e) = server.run(listener).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
