/*
 * Pluggable Scheduling Policy Subsystem
 *
 * The host framework owns run queues, timers and context switching. This
 * subsystem supplies the decision side: where a waking task should go, how
 * runnable tasks are admitted, and what an idle CPU should run next.
 *
 * CONTROL FLOW:
 * =============
 *
 *   task wakes      -> select_cpu -> enqueue -> shared queue
 *   CPU goes idle   -> dispatch   -> shared queue -> CPU local queue
 *   load / unload   -> init / exit
 *
 * LIFECYCLE:
 * ==========
 *
 *   Unloaded -> Initializing -> Active -> Exiting -> Unloaded
 *
 * Scheduling callbacks are only valid while Active.
 */

pub mod dsq;
pub mod exit_info;
pub mod lifecycle;
pub mod policies;
pub mod sched_core;
pub mod stats;
pub mod traits;
pub mod types;

pub use dsq::{DispatchQueue, DsqEntry, FifoDiscipline, QueueDiscipline, VtimeDiscipline};
pub use exit_info::{ExitKind, ExitRecord, ExitStatus, ScxExitInfo, UserExitInfo};
pub use lifecycle::{Lifecycle, ModuleState};
pub use policies::EscalatorPolicy;
pub use sched_core::{PerCpuSchedState, SchedExtCore, TaskRecord, TaskState};
pub use stats::{PerCpuStats, StatIdx};
pub use traits::{HostSchedCtx, SchedExtOps};
pub use types::{CpuId, DsqId, EnqFlags, SliceNs, SwitchMode, TaskId, WakeFlags, Weight};
