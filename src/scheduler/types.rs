/*
 * Scheduler Type Definitions
 *
 * This module defines the core types shared by the policy and the host
 * mechanism. They are lightweight and Copy-able so they can cross the
 * callback boundary by value.
 */

use bitflags::bitflags;

/// CPU identifier
///
/// Represents a logical CPU as numbered by the host framework.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u32);

impl CpuId {
    /// CPU 0, the only CPU allowed to drain the shared queue
    pub const HUB: CpuId = CpuId(0);

    /// Get the CPU ID as a usize for indexing
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Task handle
///
/// Opaque to the policy. The host allocates and frees the task; the policy
/// only passes the handle between callbacks and the host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

/// Dispatch queue identifier
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DsqId(pub u64);

impl DsqId {
    /// The single shared ordering domain
    pub const SHARED: DsqId = DsqId(0);
}

/// Time slice in nanoseconds
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SliceNs(pub u64);

impl SliceNs {
    /// Default time slice (20ms)
    pub const DEFAULT: SliceNs = SliceNs(20_000_000);

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Task scheduling weight
///
/// 100 is the weight of a nice-0 task. Higher weight accrues vtime slower.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Weight(pub u32);

impl Weight {
    pub const NORMAL: Weight = Weight(100);

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::NORMAL
    }
}

bitflags! {
    /// Flags passed to the enqueue callback
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct EnqFlags: u64 {
        /// Task is being enqueued because it woke up
        const WAKEUP       = 1 << 0;
        /// Insert at the head of the queue
        const HEAD         = 1 << 4;
        /// select_cpu ran for this wakeup
        const CPU_SELECTED = 1 << 10;
        const PREEMPT      = 1 << 32;
        const REENQ        = 1 << 40;
        const LAST         = 1 << 41;
    }
}

bitflags! {
    /// Flags passed to the select-CPU callback
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct WakeFlags: u64 {
        const TTWU    = 1 << 3;
        const FORK    = 1 << 2;
        const EXEC    = 1 << 1;
        const SYNC    = 1 << 4;
    }
}

/// How much of the system the policy takes over at init
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SwitchMode {
    /// Every task on the system
    All,
    /// Only tasks that opted in to the policy
    Partial,
}
