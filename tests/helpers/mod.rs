//! Shared helpers for integration tests.

use conntrack_stats_exporter::{app::App, config::Config, StatsSource};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A running exporter bound to an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestApp {
    /// Starts the exporter with `source` in place of the conntrack process.
    pub async fn start(source: Arc<dyn StatsSource>, timeout_ms: u64) -> Self {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1:0".parse().unwrap();
        config.command.timeout_ms = timeout_ms;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = App::builder(config)
            .source_override(source)
            .build(shutdown_rx)
            .await
            .expect("app should build");
        let addr = app.metrics_addr();
        let handle = tokio::spawn(app.run());

        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Fetches `/metrics`, returning the status code and body.
    pub async fn scrape(&self) -> (u16, String) {
        let response = reqwest::get(self.url("/metrics")).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    pub async fn shutdown(self) {
        self.shutdown_tx.send(true).unwrap();
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}
