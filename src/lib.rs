/*
 * Escalator Scheduling Policy
 *
 * This crate implements the "escalator" policy for a pluggable host scheduler
 * framework (sched_ext style). The framework owns run queues, timers and
 * context switching; this crate only supplies the policy callbacks that decide
 * where and when runnable tasks execute.
 *
 * Why this is important:
 * - Keeps placement/admission/selection decisions out of the host mechanism
 * - Lets the host attach, drive and detach the policy through one trait
 * - Exposes per-CPU statistics and a write-once exit record to monitors
 *
 * Key features:
 * - One shared dispatch queue (FIFO or weighted-vtime discipline)
 * - CPU 0 is the only CPU allowed to drain the shared queue
 * - Lock-free per-CPU counters (local / global)
 * - Explicit module lifecycle: Unloaded -> Initializing -> Active -> Exiting
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod scheduler;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, EscalatorConfig};
pub use error::SchedError;
pub use scheduler::{
    CpuId, DsqId, EnqFlags, EscalatorPolicy, ExitKind, ExitStatus, HostSchedCtx, ModuleState,
    PerCpuStats, ScxExitInfo, SchedExtCore, SchedExtOps, SliceNs, StatIdx, SwitchMode, TaskId,
    UserExitInfo, WakeFlags, Weight,
};
