/*
 * Scheduler Core - Host Mechanism Layer
 *
 * SchedExtCore plays the host framework's part for a policy:
 * 1. Holds the attached policy (Box<dyn SchedExtOps>)
 * 2. Owns per-CPU local run queues and the task records
 * 3. Drives the lifecycle: callbacks are only forwarded while Active
 * 4. Translates host events (wake, CPU idle, task stop) into policy callbacks
 * 5. Provides the HostSchedCtx implementation the policy talks to
 *
 * It is single-threaded: each method runs one callback on behalf of one CPU.
 * Cross-CPU concurrency is exercised against the policy directly.
 */

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::error::SchedError;

use super::{
    dsq::DsqEntry,
    exit_info::ScxExitInfo,
    lifecycle::{Lifecycle, ModuleState},
    traits::{HostSchedCtx, SchedExtOps},
    types::{CpuId, EnqFlags, SliceNs, SwitchMode, TaskId, WakeFlags, Weight},
};

/// Host-side record of a task
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub weight: Weight,
    pub vtime: u64,
    pub state: TaskState,
}

/// Where a task is from the host's point of view
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Not runnable
    Sleeping,
    /// Handed to the policy, not yet on a CPU
    Queued,
    /// On a CPU's local run queue
    Dispatched { cpu: CpuId },
    /// Running on a CPU
    Running { cpu: CpuId },
}

/// Per-CPU host state
#[derive(Debug)]
pub struct PerCpuSchedState {
    /// Which CPU this state belongs to
    pub cpu_id: CpuId,

    /// Tasks assigned to this CPU, in dispatch order
    pub local: VecDeque<DsqEntry>,

    /// Task currently running and the slice it was given
    pub current: Option<DsqEntry>,

    /// Last task that ran here (passed to dispatch as `prev`)
    pub last_ran: Option<TaskId>,

    /// Number of context switches performed
    pub context_switches: u64,
}

impl PerCpuSchedState {
    pub fn new(cpu_id: CpuId) -> Self {
        Self {
            cpu_id,
            local: VecDeque::new(),
            current: None,
            last_ran: None,
            context_switches: 0,
        }
    }
}

/// Everything the policy may reach through HostSchedCtx
#[derive(Debug)]
struct HostState {
    per_cpu: Vec<PerCpuSchedState>,
    tasks: BTreeMap<TaskId, TaskRecord>,
    switch_mode: Option<SwitchMode>,
    deny_switch: bool,
}

impl HostState {
    fn nr_cpus(&self) -> u32 {
        self.per_cpu.len() as u32
    }

    fn check_cpu(&self, cpu: CpuId) -> Result<(), SchedError> {
        if cpu.as_usize() < self.per_cpu.len() {
            Ok(())
        } else {
            Err(SchedError::InvalidCpu {
                cpu: cpu.0,
                nr_cpus: self.nr_cpus(),
            })
        }
    }

    fn record(&mut self, task: TaskId) -> &mut TaskRecord {
        self.tasks.entry(task).or_insert(TaskRecord {
            weight: Weight::NORMAL,
            vtime: 0,
            state: TaskState::Sleeping,
        })
    }

    fn ctx(&mut self, cpu: CpuId) -> CoreCtx<'_> {
        CoreCtx { cpu, host: self }
    }
}

/// HostSchedCtx bound to one CPU
struct CoreCtx<'a> {
    cpu: CpuId,
    host: &'a mut HostState,
}

impl HostSchedCtx for CoreCtx<'_> {
    fn current_cpu(&self) -> CpuId {
        self.cpu
    }

    fn nr_cpus(&self) -> u32 {
        self.host.nr_cpus()
    }

    fn task_weight(&self, task: TaskId) -> Weight {
        self.host
            .tasks
            .get(&task)
            .map(|rec| rec.weight)
            .unwrap_or_default()
    }

    fn task_vtime(&self, task: TaskId) -> u64 {
        self.host.tasks.get(&task).map(|rec| rec.vtime).unwrap_or(0)
    }

    fn set_task_vtime(&mut self, task: TaskId, vtime: u64) {
        self.host.record(task).vtime = vtime;
    }

    fn dispatch_local(&mut self, cpu: CpuId, entry: DsqEntry) {
        let Some(state) = self.host.per_cpu.get_mut(cpu.as_usize()) else {
            log::error!("[SchedExtCore] dispatch to invalid cpu {}", cpu.0);
            return;
        };
        state.local.push_back(entry);
        self.host.record(entry.task).state = TaskState::Dispatched { cpu };
    }

    fn switch_tasks(&mut self, mode: SwitchMode) -> Result<(), SchedError> {
        if self.host.deny_switch {
            return Err(SchedError::SwitchDenied);
        }
        self.host.switch_mode = Some(mode);
        Ok(())
    }
}

/// Scheduler Core - The Host Mechanism
///
/// External code calls attach(), wake_task(), run_next(), stop_task() and
/// detach(); SchedExtCore turns them into policy callbacks and applies the
/// policy's dispatch decisions to the per-CPU local queues.
pub struct SchedExtCore {
    /// The attached policy
    policy: Box<dyn SchedExtOps>,

    /// Host view of the policy's lifecycle
    lifecycle: Lifecycle,

    host: HostState,
}

impl SchedExtCore {
    /// Create a new SchedExtCore for `policy` on `nr_cpus` CPUs
    pub fn new(policy: Box<dyn SchedExtOps>, nr_cpus: u32) -> Self {
        let per_cpu = (0..nr_cpus).map(|i| PerCpuSchedState::new(CpuId(i))).collect();

        log::info!("[SchedExtCore] Managing {} CPU(s) for policy {}", nr_cpus, policy.name());

        Self {
            policy,
            lifecycle: Lifecycle::new(),
            host: HostState {
                per_cpu,
                tasks: BTreeMap::new(),
                switch_mode: None,
                deny_switch: false,
            },
        }
    }

    /// Make the next switch request fail (activation failure path)
    pub fn deny_switch(&mut self, deny: bool) {
        self.host.deny_switch = deny;
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn state(&self) -> ModuleState {
        self.lifecycle.state()
    }

    /// Switch mode granted at init
    pub fn switch_mode(&self) -> Option<SwitchMode> {
        self.host.switch_mode
    }

    pub fn nr_cpus(&self) -> u32 {
        self.host.nr_cpus()
    }

    /// Register a task with its scheduling weight
    pub fn add_task(&mut self, task: TaskId, weight: Weight) {
        self.host.record(task).weight = weight;
    }

    /// Seed a task's vtime, e.g. one carried over from a previous policy
    pub fn set_task_vtime(&mut self, task: TaskId, vtime: u64) {
        self.host.record(task).vtime = vtime;
    }

    pub fn task(&self, task: TaskId) -> Option<&TaskRecord> {
        self.host.tasks.get(&task)
    }

    fn ensure_active(&self) -> Result<(), SchedError> {
        match self.lifecycle.state() {
            ModuleState::Active => Ok(()),
            state => Err(SchedError::NotActive { state }),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Load the policy and run its init callback
    ///
    /// On failure the policy is left detached and no other callback runs.
    pub fn attach(&mut self) -> Result<(), SchedError> {
        self.lifecycle
            .transition(ModuleState::Unloaded, ModuleState::Initializing)
            .map_err(|_| SchedError::AlreadyActive)?;

        let mut ctx = self.host.ctx(CpuId::HUB);
        match self.policy.init(&mut ctx) {
            Ok(()) => {
                self.lifecycle
                    .transition(ModuleState::Initializing, ModuleState::Active)?;
                log::info!("[SchedExtCore] Policy {} attached", self.policy.name());
                Ok(())
            }
            Err(e) => {
                self.lifecycle
                    .transition(ModuleState::Initializing, ModuleState::Unloaded)?;
                self.host.switch_mode = None;
                log::error!(
                    "[SchedExtCore] Policy {} failed to attach: {} ({})",
                    self.policy.name(),
                    e,
                    e.errno()
                );
                Err(e)
            }
        }
    }

    /// Run the exit callback and detach the policy
    ///
    /// Tasks still on local queues are handed back to the host (Sleeping).
    pub fn detach(&mut self, ei: &ScxExitInfo) -> Result<(), SchedError> {
        self.ensure_active()?;
        self.lifecycle
            .transition(ModuleState::Active, ModuleState::Exiting)?;

        self.policy.exit(ei);

        let mut reclaimed = 0;
        for state in self.host.per_cpu.iter_mut() {
            reclaimed += state.local.len();
            state.local.clear();
            state.current = None;
        }
        for rec in self.host.tasks.values_mut() {
            rec.state = TaskState::Sleeping;
        }
        self.host.switch_mode = None;

        self.lifecycle
            .transition(ModuleState::Exiting, ModuleState::Unloaded)?;
        log::info!(
            "[SchedExtCore] Policy {} detached ({:?}), reclaimed {} task(s)",
            self.policy.name(),
            ei.kind,
            reclaimed
        );
        Ok(())
    }

    // ========================================================================
    // TASK EVENTS
    // ========================================================================

    /// A task woke up: select a CPU, then enqueue it there
    ///
    /// # Returns
    /// The CPU proposed by the policy
    pub fn wake_task(
        &mut self,
        task: TaskId,
        prev_cpu: CpuId,
        wake_flags: WakeFlags,
    ) -> Result<CpuId, SchedError> {
        self.ensure_active()?;
        self.host.check_cpu(prev_cpu)?;

        let mut ctx = self.host.ctx(prev_cpu);
        let cpu = self.policy.select_cpu(&mut ctx, task, prev_cpu, wake_flags);

        // An out-of-range proposal falls back to the previous CPU
        let target = if self.host.check_cpu(cpu).is_ok() {
            cpu
        } else {
            log::warn!("[SchedExtCore] select_cpu returned invalid cpu {}", cpu.0);
            prev_cpu
        };

        self.enqueue_on(target, task, EnqFlags::WAKEUP | EnqFlags::CPU_SELECTED)?;
        Ok(target)
    }

    /// Hand a runnable task to the policy from `cpu`
    pub fn enqueue_on(
        &mut self,
        cpu: CpuId,
        task: TaskId,
        enq_flags: EnqFlags,
    ) -> Result<(), SchedError> {
        self.ensure_active()?;
        self.host.check_cpu(cpu)?;

        self.host.record(task).state = TaskState::Queued;
        let mut ctx = self.host.ctx(cpu);
        self.policy.enqueue(&mut ctx, task, enq_flags);
        Ok(())
    }

    /// `cpu` is idle: ask the policy for work and start the next local task
    ///
    /// # Returns
    /// - Some(TaskId): The task now running on `cpu`
    /// - None: Nothing to run, the CPU stays idle
    pub fn run_next(&mut self, cpu: CpuId) -> Result<Option<TaskId>, SchedError> {
        self.ensure_active()?;
        self.host.check_cpu(cpu)?;

        let idx = cpu.as_usize();
        if let Some(current) = self.host.per_cpu[idx].current {
            return Ok(Some(current.task));
        }

        if self.host.per_cpu[idx].local.is_empty() {
            let prev = self.host.per_cpu[idx].last_ran;
            let mut ctx = self.host.ctx(cpu);
            self.policy.dispatch(&mut ctx, cpu, prev);
        }

        let Some(entry) = self.host.per_cpu[idx].local.pop_front() else {
            return Ok(None);
        };

        let state = &mut self.host.per_cpu[idx];
        state.current = Some(entry);
        if state.last_ran != Some(entry.task) {
            state.context_switches += 1;
        }
        self.host.record(entry.task).state = TaskState::Running { cpu };

        let mut ctx = self.host.ctx(cpu);
        self.policy.running(&mut ctx, entry.task);
        Ok(Some(entry.task))
    }

    /// Stop the task running on `cpu`
    ///
    /// A still-runnable task goes straight back to the policy.
    pub fn stop_task(
        &mut self,
        cpu: CpuId,
        slice_left: SliceNs,
        runnable: bool,
    ) -> Result<Option<TaskId>, SchedError> {
        self.ensure_active()?;
        self.host.check_cpu(cpu)?;

        let idx = cpu.as_usize();
        let Some(entry) = self.host.per_cpu[idx].current.take() else {
            return Ok(None);
        };
        self.host.per_cpu[idx].last_ran = Some(entry.task);

        let mut ctx = self.host.ctx(cpu);
        self.policy
            .stopping(&mut ctx, entry.task, slice_left.min(entry.slice), runnable);

        if runnable {
            self.enqueue_on(cpu, entry.task, EnqFlags::empty())?;
        } else {
            self.host.record(entry.task).state = TaskState::Sleeping;
        }
        Ok(Some(entry.task))
    }

    // ========================================================================
    // STATISTICS AND DEBUGGING
    // ========================================================================

    pub fn current_task(&self, cpu: CpuId) -> Option<TaskId> {
        self.host
            .per_cpu
            .get(cpu.as_usize())
            .and_then(|state| state.current.map(|entry| entry.task))
    }

    pub fn local_queue_len(&self, cpu: CpuId) -> usize {
        self.host
            .per_cpu
            .get(cpu.as_usize())
            .map(|state| state.local.len())
            .unwrap_or(0)
    }

    pub fn context_switch_count(&self, cpu: CpuId) -> u64 {
        self.host
            .per_cpu
            .get(cpu.as_usize())
            .map(|state| state.context_switches)
            .unwrap_or(0)
    }
}

impl core::fmt::Debug for SchedExtCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SchedExtCore")
            .field("policy", &self.policy.name())
            .field("state", &self.lifecycle.state())
            .field("cpu_count", &self.host.per_cpu.len())
            .field("per_cpu", &self.host.per_cpu)
            .finish()
    }
}
