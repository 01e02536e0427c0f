//! The main application logic, decoupled from the entry point.

use crate::{
    collector::ConntrackCollector,
    config::Config,
    core::{Exporter, StatsSource},
    invoker::CommandSource,
    server::MetricsServer,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

/// A bound, ready-to-run exporter.
pub struct App {
    server: MetricsServer,
    metrics_addr: SocketAddr,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the metrics server actually bound to.
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    /// Serves scrapes until the shutdown channel fires.
    pub async fn run(self) -> Result<()> {
        self.server.run().await.context("metrics server failed")?;
        info!("Metrics server shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Lets tests replace the `conntrack` process with a fake stats source.
pub struct AppBuilder {
    config: Config,
    source_override: Option<Arc<dyn StatsSource>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source_override: None,
        }
    }

    /// Overrides the stats source for testing.
    pub fn source_override(mut self, source: Arc<dyn StatsSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    /// Builds the collector and binds the metrics listener.
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let source: Arc<dyn StatsSource> = match self.source_override {
            Some(source) => source,
            None => Arc::new(CommandSource::new(
                self.config.command.program.clone(),
                self.config.command.args.clone(),
            )),
        };

        let collector = ConntrackCollector::new(source, self.config.command.timeout())
            .context("failed to build conntrack collector")?;
        for desc in collector.describe() {
            debug!(metric = %desc.fq_name, labels = ?desc.variable_labels, "Registered metric");
        }

        let listener = TcpListener::bind(self.config.server.listen_address)
            .await
            .with_context(|| {
                format!(
                    "failed to bind metrics server to {}",
                    self.config.server.listen_address
                )
            })?;
        let metrics_addr = listener.local_addr()?;

        let server = MetricsServer::new(
            listener,
            Arc::new(collector),
            self.config.server.metrics_path.clone(),
            shutdown_rx,
        );

        Ok(App {
            server,
            metrics_addr,
        })
    }
}
