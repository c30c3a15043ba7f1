/*
 * Scheduler Trait Definitions
 *
 * This module defines the traits that separate scheduling policy from mechanism:
 *
 * - SchedExtOps: The policy callbacks the host framework invokes
 * - HostSchedCtx: The services the host offers back to the policy
 *
 * This separation allows:
 * 1. Swapping policies without changing the host mechanism
 * 2. Testing policies in isolation against a fake host
 * 3. Clear ownership boundaries (policies never own or free tasks)
 */

use alloc::sync::Arc;

use crate::error::SchedError;

use super::{
    dsq::DsqEntry,
    exit_info::ScxExitInfo,
    types::{CpuId, EnqFlags, SliceNs, SwitchMode, TaskId, WakeFlags, Weight},
};

/// Scheduling policy callbacks
///
/// Every CPU invokes these concurrently, so they take `&self` and the
/// implementation synchronizes its own shared state. No callback may block.
///
/// The host calls:
/// - `select_cpu` when a task wakes or is created
/// - `enqueue` whenever a task becomes runnable
/// - `dispatch` whenever a CPU goes idle and needs work
/// - `init` once before any of the above
/// - `exit` once when the policy is detached
pub trait SchedExtOps: Send + Sync {
    /// Propose a CPU for a waking task
    fn select_cpu(
        &self,
        ctx: &mut dyn HostSchedCtx,
        task: TaskId,
        prev_cpu: CpuId,
        wake_flags: WakeFlags,
    ) -> CpuId;

    /// Admit a runnable task
    fn enqueue(&self, ctx: &mut dyn HostSchedCtx, task: TaskId, enq_flags: EnqFlags);

    /// Hand zero or one task to an idle CPU
    ///
    /// # Arguments
    /// - `cpu`: The CPU asking for work
    /// - `prev`: Task that was running on it (if any)
    fn dispatch(&self, ctx: &mut dyn HostSchedCtx, cpu: CpuId, prev: Option<TaskId>);

    /// Activate the policy
    ///
    /// May block. An error aborts activation and the policy is never attached.
    fn init(&self, ctx: &mut dyn HostSchedCtx) -> Result<(), SchedError>;

    /// Deactivate the policy and record why
    fn exit(&self, ei: &ScxExitInfo);

    /// A task started running on a CPU
    fn running(&self, _ctx: &mut dyn HostSchedCtx, _task: TaskId) {}

    /// A task stopped running
    ///
    /// `slice_left` is what remained of its time slice.
    fn stopping(
        &self,
        _ctx: &mut dyn HostSchedCtx,
        _task: TaskId,
        _slice_left: SliceNs,
        _runnable: bool,
    ) {
    }

    /// Policy name for debugging
    fn name(&self) -> &'static str;
}

/// Shared policies
///
/// Lets a launcher keep a handle on the policy (stats, exit info) while the
/// host owns the boxed callbacks.
impl<T: SchedExtOps + ?Sized> SchedExtOps for Arc<T> {
    fn select_cpu(
        &self,
        ctx: &mut dyn HostSchedCtx,
        task: TaskId,
        prev_cpu: CpuId,
        wake_flags: WakeFlags,
    ) -> CpuId {
        (**self).select_cpu(ctx, task, prev_cpu, wake_flags)
    }

    fn enqueue(&self, ctx: &mut dyn HostSchedCtx, task: TaskId, enq_flags: EnqFlags) {
        (**self).enqueue(ctx, task, enq_flags)
    }

    fn dispatch(&self, ctx: &mut dyn HostSchedCtx, cpu: CpuId, prev: Option<TaskId>) {
        (**self).dispatch(ctx, cpu, prev)
    }

    fn init(&self, ctx: &mut dyn HostSchedCtx) -> Result<(), SchedError> {
        (**self).init(ctx)
    }

    fn exit(&self, ei: &ScxExitInfo) {
        (**self).exit(ei)
    }

    fn running(&self, ctx: &mut dyn HostSchedCtx, task: TaskId) {
        (**self).running(ctx, task)
    }

    fn stopping(
        &self,
        ctx: &mut dyn HostSchedCtx,
        task: TaskId,
        slice_left: SliceNs,
        runnable: bool,
    ) {
        (**self).stopping(ctx, task, slice_left, runnable)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Host services for scheduling policies
///
/// This trait is the ONLY way a policy reaches into the host. A context is
/// bound to the CPU that is running the callback.
pub trait HostSchedCtx {
    // ========== QUERY OPERATIONS ==========

    /// CPU executing the current callback
    fn current_cpu(&self) -> CpuId;

    /// Number of logical CPUs
    fn nr_cpus(&self) -> u32;

    /// Scheduling weight of a task
    fn task_weight(&self, task: TaskId) -> Weight;

    /// Virtual time stored in the task record
    fn task_vtime(&self, task: TaskId) -> u64;

    // ========== STATE MODIFICATION ==========

    /// Store virtual time in the task record
    fn set_task_vtime(&mut self, task: TaskId, vtime: u64);

    /// Put a task on a CPU's local run queue
    ///
    /// This is the final assignment: the CPU runs the task for `slice`.
    fn dispatch_local(&mut self, cpu: CpuId, entry: DsqEntry);

    /// Ask the host to route tasks to this policy
    fn switch_tasks(&mut self, mode: SwitchMode) -> Result<(), SchedError>;
}
