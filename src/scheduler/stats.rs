/*
 * Per-CPU Statistics
 *
 * A small table of 64-bit counters replicated once per CPU:
 *
 *   [cpu][StatIdx::Local]   tasks this CPU pulled from the shared queue
 *   [cpu][StatIdx::Global]  tasks this CPU admitted to the shared queue
 *
 * Each CPU only bumps its own replica, so writers never contend. Counters
 * are relaxed atomics: a monitor summing across CPUs mid-session sees an
 * eventually-consistent total, not an exact snapshot.
 */

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use super::types::CpuId;

/// Number of counters per CPU
pub const NR_STATS: usize = 2;

/// Counter index
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum StatIdx {
    /// Tasks consumed from the shared queue onto this CPU
    Local = 0,
    /// Tasks admitted to the shared queue from this CPU
    Global = 1,
}

impl StatIdx {
    pub const ALL: [StatIdx; NR_STATS] = [StatIdx::Local, StatIdx::Global];

    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            StatIdx::Local => "local",
            StatIdx::Global => "global",
        }
    }
}

/// Per-CPU replicated counter table
#[derive(Debug)]
pub struct PerCpuStats {
    replicas: Vec<[AtomicU64; NR_STATS]>,
}

impl PerCpuStats {
    pub fn new(nr_cpus: u32) -> Self {
        let replicas = (0..nr_cpus)
            .map(|_| [AtomicU64::new(0), AtomicU64::new(0)])
            .collect();
        Self { replicas }
    }

    pub fn nr_cpus(&self) -> u32 {
        self.replicas.len() as u32
    }

    /// Bump a counter in `cpu`'s replica
    ///
    /// A CPU without a replica is ignored, like a failed per-CPU map lookup.
    pub(crate) fn inc(&self, cpu: CpuId, idx: StatIdx) {
        if let Some(replica) = self.replicas.get(cpu.as_usize()) {
            replica[idx.as_usize()].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read one CPU's counter (0 for an unknown CPU)
    pub fn read(&self, cpu: CpuId, idx: StatIdx) -> u64 {
        self.replicas
            .get(cpu.as_usize())
            .map(|replica| replica[idx.as_usize()].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum a counter across every CPU
    pub fn sum(&self, idx: StatIdx) -> u64 {
        self.replicas
            .iter()
            .map(|replica| replica[idx.as_usize()].load(Ordering::Relaxed))
            .fold(0u64, u64::wrapping_add)
    }

    /// Aggregated [local, global] totals
    pub fn snapshot(&self) -> [u64; NR_STATS] {
        StatIdx::ALL.map(|idx| self.sum(idx))
    }
}
