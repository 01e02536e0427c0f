//! # Conntrack Statistics Collector
//!
//! `ConntrackCollector` owns the metric descriptors for every statistic the
//! `conntrack --stats` dump reports, plus a counter of invocations that missed
//! their deadline. Each call to `collect` is an independent transaction:
//!
//! - **success**: one `conntrack_stats_<name>{cpu="N"}` sample for every
//!   statistic present in the dump for CPU `N`, plus the timeout counter;
//! - **timeout**: the timeout counter is incremented and is the only family
//!   returned;
//! - **failure**: the tool failed or printed something unparseable, and the
//!   error is returned so the scrape can be reported as failed.
//!
//! No state other than the timeout counter survives a scrape.

use crate::aggregate::{aggregate, SampleTable};
use crate::core::{Exporter, StatsSource, CPU_FIELD};
use crate::invoker::{run_diagnostic_tool, InvokeError};
use crate::parser::{parse_lines, ParseError};
use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntCounter, IntCounterVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub const NAMESPACE: &str = "conntrack";
pub const SUBSYSTEM: &str = "stats";

/// Statistics reported per CPU by `conntrack --stats`, in emission order.
pub const STAT_NAMES: [&str; 9] = [
    "found",
    "invalid",
    "ignore",
    "insert",
    "insert_failed",
    "drop",
    "early_drop",
    "error",
    "search_restart",
];

const TIMEOUT_COUNTER_NAME: &str = "ctxtimeout";
const TIMEOUT_COUNTER_HELP: &str = "Context timeouts calling 'conntrack' command";

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("stats command failed: {0}")]
    Invoke(#[from] InvokeError),

    #[error("malformed stats output: {0}")]
    Parse(#[from] ParseError),

    #[error("metric construction failed: {0}")]
    Metric(#[from] prometheus::Error),
}

/// Builds the counter that tracks invocations which missed their deadline.
///
/// Clones share the same underlying value, so a caller may keep one clone for
/// inspection and hand another to `ConntrackCollector::with_timeout_counter`.
pub fn timeout_counter() -> Result<IntCounter, prometheus::Error> {
    IntCounter::with_opts(
        Opts::new(TIMEOUT_COUNTER_NAME, TIMEOUT_COUNTER_HELP)
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
    )
}

struct StatFamily {
    name: &'static str,
    opts: Opts,
    desc: Desc,
}

impl StatFamily {
    fn new(name: &'static str) -> Result<Self, prometheus::Error> {
        let opts = Opts::new(name, format!("Total of conntrack {}", name))
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM);
        let desc = Desc::new(
            opts.fq_name(),
            opts.help.clone(),
            vec![CPU_FIELD.to_string()],
            HashMap::new(),
        )?;
        Ok(Self { name, opts, desc })
    }

    /// Renders this statistic for every CPU that reported it, or `None` if no
    /// CPU did.
    fn observe(&self, table: &SampleTable) -> Result<Option<MetricFamily>, prometheus::Error> {
        let counters = IntCounterVec::new(self.opts.clone(), &[CPU_FIELD])?;
        let mut observed = false;
        for (cpu, sample) in table.iter() {
            if let Some(&value) = sample.get(self.name) {
                let cpu = cpu.to_string();
                counters.with_label_values(&[cpu.as_str()]).inc_by(value);
                observed = true;
            }
        }
        if !observed {
            return Ok(None);
        }

        let mut family = match counters.collect().pop() {
            Some(family) => family,
            None => return Ok(None),
        };
        // Children come out of a hash map; keep CPUs in ascending order.
        family
            .mut_metric()
            .sort_by_key(|m| m.get_label().first().and_then(|l| l.get_value().parse::<u64>().ok()));
        Ok(Some(family))
    }
}

/// Exports `conntrack --stats` as per-CPU Prometheus counters.
pub struct ConntrackCollector {
    source: Arc<dyn StatsSource>,
    timeout: Duration,
    stats: Vec<StatFamily>,
    timeout_counter: IntCounter,
}

impl std::fmt::Debug for ConntrackCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConntrackCollector")
            .field("source", &self.source.name())
            .field("timeout", &self.timeout)
            .field("timeouts", &self.timeout_counter.get())
            .finish_non_exhaustive()
    }
}

impl ConntrackCollector {
    /// Creates a collector with its own, zeroed timeout counter.
    pub fn new(source: Arc<dyn StatsSource>, timeout: Duration) -> Result<Self, CollectError> {
        Self::with_timeout_counter(source, timeout, timeout_counter()?)
    }

    /// Creates a collector around an existing timeout counter.
    pub fn with_timeout_counter(
        source: Arc<dyn StatsSource>,
        timeout: Duration,
        timeout_counter: IntCounter,
    ) -> Result<Self, CollectError> {
        let stats = STAT_NAMES
            .iter()
            .map(|&name| StatFamily::new(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            timeout,
            stats,
            timeout_counter,
        })
    }

    /// Number of scrapes so far whose stats command missed the deadline.
    pub fn timeouts(&self) -> u64 {
        self.timeout_counter.get()
    }

    /// Runs the stats command and groups its output by CPU.
    pub async fn sample(&self) -> Result<SampleTable, CollectError> {
        let lines = run_diagnostic_tool(self.source.as_ref(), self.timeout).await?;
        let samples = parse_lines(&lines)?;
        Ok(aggregate(samples))
    }
}

#[async_trait]
impl Exporter for ConntrackCollector {
    fn describe(&self) -> Vec<&Desc> {
        self.stats
            .iter()
            .map(|stat| &stat.desc)
            .chain(self.timeout_counter.desc())
            .collect()
    }

    async fn collect(&self) -> Result<Vec<MetricFamily>, CollectError> {
        let start = Instant::now();
        let table = match self.sample().await {
            Ok(table) => table,
            Err(CollectError::Invoke(e)) if e.is_timeout() => {
                self.timeout_counter.inc();
                warn!(
                    source = self.source.name(),
                    timeout = ?self.timeout,
                    timeouts = self.timeout_counter.get(),
                    "Stats command timed out; only reporting the timeout counter"
                );
                return Ok(self.timeout_counter.collect());
            }
            Err(e) => return Err(e),
        };

        let mut families = Vec::with_capacity(self.stats.len() + 1);
        for stat in &self.stats {
            if let Some(family) = stat.observe(&table)? {
                families.push(family);
            }
        }
        families.extend(self.timeout_counter.collect());

        debug!(
            cpus = table.cpus().count(),
            families = families.len(),
            elapsed = ?start.elapsed(),
            "Collected conntrack stats"
        );
        Ok(families)
    }
}
