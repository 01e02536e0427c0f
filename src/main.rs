//! Conntrack Stats Exporter
//!
//! Serves the per-CPU counters of `conntrack --stats` to Prometheus.

use anyhow::Result;
use clap::Parser;
use conntrack_stats_exporter::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Conntrack stats exporter starting up...");
    info!("Listen Address: {}", config.server.listen_address);
    info!("Metrics Path: {}", config.server.metrics_path);
    info!(
        "Command: {} {}",
        config.command.program,
        config.command.args.join(" ")
    );
    info!("Command Timeout: {}ms", config.command.timeout_ms);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    info!("Serving metrics on {}", app.metrics_addr());
    let server = tokio::spawn(app.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    match server.await {
        Ok(result) => result?,
        Err(e) => error!("Metrics server task panicked: {:?}", e),
    }

    info!("Exiting.");
    Ok(())
}
