// crates/server/src/main.rs
//! applykit server binary.
//!
//! `applykit serve` (the default) opens the stores, starts the task workers
//! and serves the HTTP API. `applykit check-config` validates settings and
//! exits.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use applykit_core::create_runner;
use applykit_server::logging::init_tracing;
use applykit_server::{create_app, init_metrics, start_services, AppConfig, Cli, Command, ServeArgs};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.into_command() {
        Command::Serve(args) => serve(&args).await,
        Command::CheckConfig(args) => check_config(&args),
    }
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let config = AppConfig::load(args)?;
    init_metrics();

    let services = start_services(&config).await?;
    let app = create_app(services.state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        runner = ?config.runner.mode,
        "applykit listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown();
    tracing::info!("applykit stopped");
    Ok(())
}

fn check_config(args: &ServeArgs) -> Result<()> {
    let config = AppConfig::load(args)?;
    let runner = create_runner(&config.runner)?;
    println!(
        "configuration ok: listen {}:{}, runner {}, workers {}, reaper {}",
        config.server.host,
        config.server.port,
        runner.name(),
        config.tasks.worker_concurrency,
        if config.tasks.stale_after_secs == 0 {
            "off".to_string()
        } else {
            format!("{}s", config.tasks.stale_after_secs)
        }
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
