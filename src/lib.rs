//! Conntrack Stats Exporter
//!
//! Runs `conntrack --stats` on every Prometheus scrape and republishes its
//! per-CPU counters as `conntrack_stats_*` metrics.
//!
//! The pipeline is `invoker` (run the tool under a deadline) → `parser`
//! (`key=value` lines) → `aggregate` (group by CPU) → `collector` (emit metric
//! families). `server` and `app` wire it to HTTP.

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod collector;
pub mod config;
pub mod core;
pub mod invoker;
pub mod parser;
pub mod server;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use collector::{CollectError, ConntrackCollector};
