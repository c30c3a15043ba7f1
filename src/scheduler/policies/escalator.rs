/*
 * Escalator Scheduling Policy
 *
 * A global-queue policy where all work funnels through CPU 0:
 *
 * - select_cpu: always proposes CPU 0, placement carries no information
 * - enqueue:    counts a "global" admission on the invoking CPU and pushes the
 *               task onto the shared queue with the default time slice
 * - dispatch:   only CPU 0 drains the shared queue, one task per call; every
 *               other CPU returns without work
 * - init:       asks the host to route all (or opted-in) tasks here
 * - exit:       records the host's exit reason once
 *
 * The shared queue runs in one of two disciplines picked at load time:
 *
 * - FIFO (default, fifo_sched): strict arrival order
 * - Weighted vtime (fifo_sched off): tasks ordered by virtual time, which
 *   grows by the slice they used scaled by 100/weight. A task that slept
 *   cannot come back with more than one slice of credit.
 *
 * The lifecycle gates exit: only the Active -> Exiting edge records, so the
 * exit record is written once per session.
 */

use core::sync::atomic::{AtomicU64, Ordering};

use crate::config::EscalatorConfig;
use crate::error::SchedError;

use super::super::{
    dsq::{DispatchQueue, DsqEntry},
    exit_info::{ScxExitInfo, UserExitInfo},
    lifecycle::{Lifecycle, ModuleState},
    stats::{PerCpuStats, StatIdx},
    traits::{HostSchedCtx, SchedExtOps},
    types::{CpuId, DsqId, EnqFlags, SliceNs, SwitchMode, TaskId, WakeFlags},
};

/// Escalator policy state
///
/// Everything here is shared by all CPUs: the queue is lock-protected, the
/// counters and vtime clock are atomics.
#[derive(Debug)]
pub struct EscalatorPolicy {
    config: EscalatorConfig,

    /// The single ordering domain (DsqId::SHARED)
    shared: DispatchQueue,

    /// [local, global] counters per CPU
    stats: PerCpuStats,

    /// Exit record for the launcher
    uei: UserExitInfo,

    lifecycle: Lifecycle,

    /// Highest vtime of any task that started running
    vtime_now: AtomicU64,
}

impl EscalatorPolicy {
    /// Create a new escalator policy for `nr_cpus` CPUs
    pub fn new(config: EscalatorConfig, nr_cpus: u32) -> Self {
        let shared = if config.fifo_sched {
            DispatchQueue::fifo(DsqId::SHARED)
        } else {
            DispatchQueue::vtime(DsqId::SHARED)
        };

        Self {
            config,
            shared,
            stats: PerCpuStats::new(nr_cpus),
            uei: UserExitInfo::new(),
            lifecycle: Lifecycle::new(),
            vtime_now: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> EscalatorConfig {
        self.config
    }

    /// Read-only view of the per-CPU counters
    pub fn stats(&self) -> &PerCpuStats {
        &self.stats
    }

    pub fn exit_info(&self) -> &UserExitInfo {
        &self.uei
    }

    pub fn state(&self) -> ModuleState {
        self.lifecycle.state()
    }

    /// Number of tasks waiting in the shared queue
    pub fn nr_queued(&self) -> usize {
        self.shared.len()
    }

    /// Task at the front of the shared queue
    pub fn peek_queued(&self) -> Option<TaskId> {
        self.shared.peek()
    }

    pub fn vtime_now(&self) -> u64 {
        self.vtime_now.load(Ordering::Relaxed)
    }

    /// Vtime a task is queued with
    ///
    /// Limits the credit an idle task can bank to one default slice.
    fn queue_vtime(&self, task_vtime: u64) -> u64 {
        let floor = self.vtime_now().saturating_sub(SliceNs::DEFAULT.get());
        task_vtime.max(floor)
    }
}

impl SchedExtOps for EscalatorPolicy {
    fn select_cpu(
        &self,
        _ctx: &mut dyn HostSchedCtx,
        task: TaskId,
        prev_cpu: CpuId,
        _wake_flags: WakeFlags,
    ) -> CpuId {
        log::trace!("[Escalator] select_cpu: task {} (prev cpu {}) -> cpu 0", task.0, prev_cpu.0);
        CpuId::HUB
    }

    fn enqueue(&self, ctx: &mut dyn HostSchedCtx, task: TaskId, enq_flags: EnqFlags) {
        let cpu = ctx.current_cpu();
        self.stats.inc(cpu, StatIdx::Global);

        let mut entry = DsqEntry::new(task, SliceNs::DEFAULT, enq_flags);
        if !self.config.fifo_sched {
            entry = entry.with_vtime(self.queue_vtime(ctx.task_vtime(task)));
        }

        self.shared.insert(entry);
        log::trace!("[Escalator] enqueue: task {} from cpu {}", task.0, cpu.0);
    }

    fn dispatch(&self, ctx: &mut dyn HostSchedCtx, cpu: CpuId, _prev: Option<TaskId>) {
        // Only the hub drains the shared queue
        if cpu != CpuId::HUB {
            return;
        }

        if let Some(entry) = self.shared.pop() {
            self.stats.inc(cpu, StatIdx::Local);
            log::trace!("[Escalator] dispatch: task {} -> cpu {}", entry.task.0, cpu.0);
            ctx.dispatch_local(cpu, entry);
        }
    }

    fn init(&self, ctx: &mut dyn HostSchedCtx) -> Result<(), SchedError> {
        if self.uei.exited() {
            return Err(SchedError::SessionEnded);
        }

        self.lifecycle
            .transition(ModuleState::Unloaded, ModuleState::Initializing)
            .map_err(|_| SchedError::AlreadyActive)?;

        let mode = if self.config.switch_partial {
            SwitchMode::Partial
        } else {
            SwitchMode::All
        };

        if let Err(e) = ctx.switch_tasks(mode) {
            log::error!("[Escalator] init failed: {}", e);
            self.lifecycle
                .transition(ModuleState::Initializing, ModuleState::Unloaded)?;
            return Err(e);
        }

        self.lifecycle
            .transition(ModuleState::Initializing, ModuleState::Active)?;

        log::info!(
            "[Escalator] Active: {} ordering, {:?} switch, {} CPU(s)",
            self.shared.discipline(),
            mode,
            self.stats.nr_cpus()
        );
        Ok(())
    }

    fn exit(&self, ei: &ScxExitInfo) {
        if let Err(e) = self
            .lifecycle
            .transition(ModuleState::Active, ModuleState::Exiting)
        {
            log::warn!("[Escalator] exit ignored: {}", e);
            return;
        }

        self.uei.record(ei);

        let left = self.shared.len();
        if left > 0 {
            log::debug!("[Escalator] {} task(s) left in the shared queue", left);
        }

        let [local, global] = self.stats.snapshot();
        log::info!("[Escalator] Exiting: local={} global={}", local, global);

        if let Err(e) = self
            .lifecycle
            .transition(ModuleState::Exiting, ModuleState::Unloaded)
        {
            log::warn!("[Escalator] {}", e);
        }
    }

    fn running(&self, ctx: &mut dyn HostSchedCtx, task: TaskId) {
        if self.config.fifo_sched {
            return;
        }

        // Global vtime only moves forward
        self.vtime_now.fetch_max(ctx.task_vtime(task), Ordering::Relaxed);
    }

    fn stopping(
        &self,
        ctx: &mut dyn HostSchedCtx,
        task: TaskId,
        slice_left: SliceNs,
        _runnable: bool,
    ) {
        if self.config.fifo_sched {
            return;
        }

        // Charge the used slice, scaled by the inverse of the weight
        let used = SliceNs::DEFAULT.get().saturating_sub(slice_left.get());
        let weight = u64::from(ctx.task_weight(task).get().max(1));
        let vtime = ctx.task_vtime(task);
        ctx.set_task_vtime(task, vtime.saturating_add(used * 100 / weight));
    }

    fn name(&self) -> &'static str {
        "escalator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::exit_info::{ExitKind, ExitStatus};
    use crate::scheduler::types::Weight;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    /// Minimal host bound to one CPU
    struct FakeHost {
        cpu: CpuId,
        nr_cpus: u32,
        vtimes: BTreeMap<TaskId, u64>,
        weights: BTreeMap<TaskId, Weight>,
        dispatched: Vec<(CpuId, DsqEntry)>,
        switched: Option<SwitchMode>,
        deny_switch: bool,
    }

    impl FakeHost {
        fn new(nr_cpus: u32) -> Self {
            Self {
                cpu: CpuId(0),
                nr_cpus,
                vtimes: BTreeMap::new(),
                weights: BTreeMap::new(),
                dispatched: Vec::new(),
                switched: None,
                deny_switch: false,
            }
        }

        fn on(&mut self, cpu: u32) -> &mut Self {
            self.cpu = CpuId(cpu);
            self
        }

        fn dispatched_tasks(&self) -> Vec<u64> {
            self.dispatched.iter().map(|(_, e)| e.task.0).collect()
        }
    }

    impl HostSchedCtx for FakeHost {
        fn current_cpu(&self) -> CpuId {
            self.cpu
        }

        fn nr_cpus(&self) -> u32 {
            self.nr_cpus
        }

        fn task_weight(&self, task: TaskId) -> Weight {
            self.weights.get(&task).copied().unwrap_or_default()
        }

        fn task_vtime(&self, task: TaskId) -> u64 {
            self.vtimes.get(&task).copied().unwrap_or(0)
        }

        fn set_task_vtime(&mut self, task: TaskId, vtime: u64) {
            self.vtimes.insert(task, vtime);
        }

        fn dispatch_local(&mut self, cpu: CpuId, entry: DsqEntry) {
            self.dispatched.push((cpu, entry));
        }

        fn switch_tasks(&mut self, mode: SwitchMode) -> Result<(), SchedError> {
            if self.deny_switch {
                return Err(SchedError::SwitchDenied);
            }
            self.switched = Some(mode);
            Ok(())
        }
    }

    fn active_policy(config: EscalatorConfig, host: &mut FakeHost) -> EscalatorPolicy {
        let policy = EscalatorPolicy::new(config, host.nr_cpus);
        policy.init(host).unwrap();
        policy
    }

    #[test]
    fn test_select_cpu_always_hub() {
        let mut host = FakeHost::new(4);
        let policy = active_policy(EscalatorConfig::new(), &mut host);

        for prev in 0..4 {
            let cpu = policy.select_cpu(
                host.on(prev),
                TaskId(10 + prev as u64),
                CpuId(prev),
                WakeFlags::TTWU | WakeFlags::SYNC,
            );
            assert_eq!(cpu, CpuId::HUB);
        }
        assert_eq!(policy.nr_queued(), 0);
        assert_eq!(policy.stats().snapshot(), [0, 0]);
    }

    #[test]
    fn test_enqueue_counts_on_invoking_cpu() {
        let mut host = FakeHost::new(4);
        let policy = active_policy(EscalatorConfig::new(), &mut host);

        policy.enqueue(host.on(3), TaskId(1), EnqFlags::WAKEUP);

        assert_eq!(policy.stats().read(CpuId(3), StatIdx::Global), 1);
        for cpu in 0..3 {
            assert_eq!(policy.stats().read(CpuId(cpu), StatIdx::Global), 0);
        }
        assert_eq!(policy.peek_queued(), Some(TaskId(1)));
    }

    #[test]
    fn test_dispatch_on_non_hub_is_noop() {
        let mut host = FakeHost::new(4);
        let policy = active_policy(EscalatorConfig::new(), &mut host);
        policy.enqueue(host.on(1), TaskId(1), EnqFlags::empty());

        for cpu in 1..4 {
            policy.dispatch(host.on(cpu), CpuId(cpu), None);
        }

        assert!(host.dispatched.is_empty());
        assert_eq!(policy.nr_queued(), 1);
        assert_eq!(policy.stats().sum(StatIdx::Local), 0);
    }

    #[test]
    fn test_dispatch_hands_default_slice_and_flags() {
        let mut host = FakeHost::new(2);
        let policy = active_policy(EscalatorConfig::new(), &mut host);
        policy.enqueue(host.on(1), TaskId(5), EnqFlags::WAKEUP | EnqFlags::CPU_SELECTED);

        policy.dispatch(host.on(0), CpuId::HUB, None);

        let (cpu, entry) = host.dispatched[0];
        assert_eq!(cpu, CpuId::HUB);
        assert_eq!(entry.task, TaskId(5));
        assert_eq!(entry.slice, SliceNs::DEFAULT);
        assert_eq!(entry.enq_flags, EnqFlags::WAKEUP | EnqFlags::CPU_SELECTED);
        assert_eq!(policy.stats().read(CpuId::HUB, StatIdx::Local), 1);

        // Empty queue: hub idles too
        policy.dispatch(host.on(0), CpuId::HUB, Some(TaskId(5)));
        assert_eq!(host.dispatched.len(), 1);
        assert_eq!(policy.stats().read(CpuId::HUB, StatIdx::Local), 1);
    }

    #[test]
    fn test_init_switch_mode_follows_config() {
        let mut host = FakeHost::new(1);
        active_policy(EscalatorConfig::new(), &mut host);
        assert_eq!(host.switched, Some(SwitchMode::All));

        let mut host = FakeHost::new(1);
        active_policy(EscalatorConfig::new().partial(true), &mut host);
        assert_eq!(host.switched, Some(SwitchMode::Partial));
    }

    #[test]
    fn test_second_init_is_rejected() {
        let mut host = FakeHost::new(2);
        let policy = active_policy(EscalatorConfig::new(), &mut host);
        policy.enqueue(host.on(1), TaskId(1), EnqFlags::empty());

        assert_eq!(policy.init(&mut host), Err(SchedError::AlreadyActive));
        assert_eq!(policy.state(), ModuleState::Active);
        assert_eq!(policy.nr_queued(), 1);
        assert_eq!(policy.stats().sum(StatIdx::Global), 1);
    }

    #[test]
    fn test_init_failure_leaves_module_unloaded() {
        let mut host = FakeHost::new(2);
        host.deny_switch = true;
        let policy = EscalatorPolicy::new(EscalatorConfig::new(), 2);

        assert_eq!(policy.init(&mut host), Err(SchedError::SwitchDenied));
        assert_eq!(policy.state(), ModuleState::Unloaded);
        assert_eq!(policy.exit_info().status(), ExitStatus::NotExited);

        // Exit without activation records nothing
        policy.exit(&ScxExitInfo::new(ExitKind::Error, "init failed", ""));
        assert_eq!(policy.exit_info().status(), ExitStatus::NotExited);
    }

    #[test]
    fn test_exit_records_once_and_ends_session() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::new(), &mut host);

        policy.exit(&ScxExitInfo::new(ExitKind::Unreg, "unregistered from user space", ""));
        assert_eq!(policy.state(), ModuleState::Unloaded);

        // Second exit is turned away by the lifecycle and leaves the record alone
        policy.exit(&ScxExitInfo::new(ExitKind::Error, "late", ""));
        assert_eq!(policy.state(), ModuleState::Unloaded);

        let ExitStatus::Exited(rec) = policy.exit_info().status() else {
            panic!("exit not recorded");
        };
        assert_eq!(rec.kind, ExitKind::Unreg);
        assert_eq!(policy.init(&mut host), Err(SchedError::SessionEnded));
    }

    #[test]
    fn test_vtime_orders_light_users_first() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::new().fifo(false), &mut host);
        host.vtimes.insert(TaskId(1), 3_000);
        host.vtimes.insert(TaskId(2), 1_000);
        host.vtimes.insert(TaskId(3), 2_000);

        for task in 1..=3 {
            policy.enqueue(&mut host, TaskId(task), EnqFlags::empty());
        }
        for _ in 0..3 {
            policy.dispatch(&mut host, CpuId::HUB, None);
        }

        assert_eq!(host.dispatched_tasks(), [2, 3, 1]);
    }

    #[test]
    fn test_vtime_credit_is_capped_at_one_slice() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::new().fifo(false), &mut host);
        let busy = TaskId(1);
        let sleeper = TaskId(2);
        host.vtimes.insert(busy, 100 * SliceNs::DEFAULT.get());

        policy.running(&mut host, busy);
        assert_eq!(policy.vtime_now(), 100 * SliceNs::DEFAULT.get());

        policy.enqueue(&mut host, sleeper, EnqFlags::WAKEUP);
        policy.dispatch(&mut host, CpuId::HUB, None);
        assert_eq!(host.dispatched[0].1.vtime, 99 * SliceNs::DEFAULT.get());
    }

    #[test]
    fn test_stopping_charges_by_weight() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::new().fifo(false), &mut host);
        host.weights.insert(TaskId(1), Weight(200));

        let half = SliceNs(SliceNs::DEFAULT.get() / 2);
        policy.stopping(&mut host, TaskId(1), half, true);
        policy.stopping(&mut host, TaskId(2), half, true);

        // Double weight accrues half the vtime
        assert_eq!(host.task_vtime(TaskId(1)), half.get() / 2);
        assert_eq!(host.task_vtime(TaskId(2)), half.get());
    }

    #[test]
    fn test_default_config_keeps_arrival_order() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::default(), &mut host);
        host.vtimes.insert(TaskId(1), 3_000);
        host.vtimes.insert(TaskId(2), 1_000);
        host.vtimes.insert(TaskId(3), 2_000);

        for task in 1..=3 {
            policy.enqueue(&mut host, TaskId(task), EnqFlags::empty());
        }
        for _ in 0..3 {
            policy.dispatch(&mut host, CpuId::HUB, None);
        }

        assert_eq!(host.dispatched_tasks(), [1, 2, 3]);
    }

    #[test]
    fn test_fifo_ignores_vtime() {
        let mut host = FakeHost::new(1);
        let policy = active_policy(EscalatorConfig::new(), &mut host);
        host.vtimes.insert(TaskId(1), 9_000);

        policy.running(&mut host, TaskId(1));
        policy.stopping(&mut host, TaskId(1), SliceNs(0), false);

        assert_eq!(policy.vtime_now(), 0);
        assert_eq!(host.task_vtime(TaskId(1)), 9_000);
    }
}
