// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use sentinel::backend::ReqwestBackend;
use sentinel::config;
use sentinel::relay;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel", about = "Streaming question-answering relay")]
struct Cli {
    /// Path to a sentinel.yaml config file. Defaults plus environment when omitted.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(long, env = "SENTINEL_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => {
            let source = config::FileSource::new(path);
            match config::load_config(&source) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("failed to load config: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => config::Config::from_env(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        backend = %config.backend.base_url,
        timeout_ms = config.backend.timeout_ms,
        read_timeout_ms = config.backend.read_timeout_ms,
        cors_origins = ?config.server.cors_origins,
        "config loaded"
    );

    let backend = match ReqwestBackend::new(&config.backend) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!("failed to build backend client: {e}");
            std::process::exit(1);
        }
    };

    let app = relay::build_router(backend, &config.server);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "sentinel listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
