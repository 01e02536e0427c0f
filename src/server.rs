//! # Metrics Server
//!
//! This module defines the `MetricsServer`, an `axum` web server that runs a
//! fresh collection on every request to the metrics path and answers in the
//! Prometheus text exposition format.
//!
//! A collection that fails outright is answered with
//! `500 Internal Server Error` so the scraper records a failed scrape instead
//! of a set of missing or zeroed series.

use crate::collector::CollectError;
use crate::core::Exporter;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, trace};

/// Error type for scrape failures.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("collection failed: {0}")]
    Collect(#[from] CollectError),

    #[error("encoding failed: {0}")]
    Encode(#[from] prometheus::Error),
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        error!(error = %self, "Scrape failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", self)).into_response()
    }
}

#[derive(Clone)]
struct ScrapeState {
    exporter: Arc<dyn Exporter>,
    metrics_path: Arc<str>,
}

/// A server that exposes an `Exporter` to a Prometheus scraper.
pub struct MetricsServer {
    listener: TcpListener,
    exporter: Arc<dyn Exporter>,
    metrics_path: String,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// Creates a new `MetricsServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `exporter` - The collector driven on every scrape.
    /// * `metrics_path` - The route metrics are served under.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        exporter: Arc<dyn Exporter>,
        metrics_path: impl Into<String>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            exporter,
            metrics_path: metrics_path.into(),
            shutdown_rx,
        }
    }

    /// Builds the router without binding it, for use with any listener.
    pub fn router(exporter: Arc<dyn Exporter>, metrics_path: &str) -> Router {
        let state = ScrapeState {
            exporter,
            metrics_path: Arc::from(metrics_path),
        };
        Router::new()
            .route("/", get(landing))
            .route(metrics_path, get(scrape))
            .with_state(state)
    }

    /// Returns a future that serves requests until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = std::io::Result<()>> {
        let app = Self::router(self.exporter, &self.metrics_path);
        let mut shutdown_rx = self.shutdown_rx;
        let listener = self.listener;

        async move {
            let shutdown = async move {
                // A dropped sender also means shutdown.
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                trace!("Metrics server received shutdown signal.");
            };
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await?;
            trace!("Metrics server task finished.");
            Ok(())
        }
    }
}

async fn scrape(State(state): State<ScrapeState>) -> Result<Response, ScrapeError> {
    let families = state.exporter.collect().await?;

    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    encoder.encode(&families, &mut body)?;
    debug!(families = families.len(), bytes = body.len(), "Served scrape");

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response())
}

async fn landing(State(state): State<ScrapeState>) -> Html<String> {
    Html(format!(
        "<html><head><title>Conntrack Stats Exporter</title></head>\
         <body><h1>Conntrack Stats Exporter</h1>\
         <p><a href=\"{path}\">{path}</a></p></body></html>",
        path = state.metrics_path
    ))
}
