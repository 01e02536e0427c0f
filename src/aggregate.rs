//! Grouping parsed samples by CPU.

use crate::core::{RawSample, CPU_FIELD};
use std::collections::BTreeMap;
use tracing::trace;

/// Per-CPU samples from one statistics dump, ordered by CPU index.
///
/// CPUs the tool skipped are absent rather than zero-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    by_cpu: BTreeMap<u64, RawSample>,
}

impl SampleTable {
    /// Stores `sample` for `cpu`, replacing any earlier sample for that CPU.
    pub fn insert(&mut self, cpu: u64, sample: RawSample) {
        self.by_cpu.insert(cpu, sample);
    }

    pub fn get(&self, cpu: u64) -> Option<&RawSample> {
        self.by_cpu.get(&cpu)
    }

    /// Highest CPU index seen plus one, or zero for an empty table.
    ///
    /// Saturates at `usize::MAX` for indices that do not fit.
    pub fn len(&self) -> usize {
        self.by_cpu.keys().next_back().map_or(0, |&cpu| {
            usize::try_from(cpu)
                .ok()
                .and_then(|cpu| cpu.checked_add(1))
                .unwrap_or(usize::MAX)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_cpu.is_empty()
    }

    /// CPU indices present in the table, ascending.
    pub fn cpus(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_cpu.keys().copied()
    }

    /// Iterates `(cpu, sample)` pairs in ascending CPU order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &RawSample)> {
        self.by_cpu.iter().map(|(cpu, sample)| (*cpu, sample))
    }
}

/// Builds a `SampleTable` from parsed lines.
///
/// Samples without a `cpu` field are dropped. When two samples name the same
/// CPU the later one replaces the earlier one as a whole.
pub fn aggregate<I>(samples: I) -> SampleTable
where
    I: IntoIterator<Item = RawSample>,
{
    let mut table = SampleTable::default();
    for sample in samples {
        match sample.get(CPU_FIELD).copied() {
            Some(cpu) => table.insert(cpu, sample),
            None if sample.is_empty() => {}
            None => trace!(fields = sample.len(), "Dropping sample without a cpu field"),
        }
    }
    table
}
