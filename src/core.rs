//! Core domain types and service traits for the exporter
//!
//! This module defines the data passed between the pipeline stages and the
//! trait contracts at the two seams of the system: where raw statistics come
//! from, and how a scrape pulls metric families out of a collector.

use crate::collector::CollectError;
use crate::invoker::InvokeError;
use async_trait::async_trait;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::collections::HashMap;

/// The field carrying the CPU index of a per-CPU record.
pub const CPU_FIELD: &str = "cpu";

/// The `key=value` fields extracted from one line of tool output.
pub type RawSample = HashMap<String, u64>;

// =============================================================================
// Service Traits
// =============================================================================

/// Produces the raw text of one statistics dump.
///
/// The production implementation spawns `conntrack --stats`; tests substitute
/// canned or deliberately slow sources.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// A short name for logging (usually the program being run).
    fn name(&self) -> &str;

    /// Runs one dump to completion and returns its standard output.
    ///
    /// Implementations must be cancel-safe: the caller drops the future when
    /// the invocation deadline elapses.
    async fn fetch(&self) -> Result<String, InvokeError>;
}

/// The two-phase contract a scrape endpoint drives.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Returns every descriptor this exporter can ever emit.
    ///
    /// The result does not depend on whether `collect` has been called.
    fn describe(&self) -> Vec<&Desc>;

    /// Produces a fresh snapshot of metric families.
    ///
    /// # Returns
    /// * `Ok(families)` for a complete or fail-soft scrape
    /// * `Err` when the scrape must be reported as failed
    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError>;
}
