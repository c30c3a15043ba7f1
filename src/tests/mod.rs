/*
 * Test Suite for the Escalator Policy
 *
 * Scenario tests that drive the policy the way the host framework does.
 *
 * - `escalator_scenarios`: end-to-end sessions through SchedExtCore
 * - `concurrency`: many CPUs calling the policy at once
 */


use alloc::vec::Vec;

use crate::error::SchedError;
use crate::scheduler::{CpuId, DsqEntry, HostSchedCtx, SwitchMode, TaskId, Weight};

/// ===============================
///  PER-CPU TEST HOST
/// ===============================

/// Host context for one CPU thread
///
/// Collects whatever the policy dispatches; vtime is always 0.
pub struct CpuCtx {
    pub cpu: CpuId,
    pub nr_cpus: u32,
    pub dispatched: Vec<DsqEntry>,
}

impl CpuCtx {
    pub fn new(cpu: u32, nr_cpus: u32) -> Self {
        Self {
            cpu: CpuId(cpu),
            nr_cpus,
            dispatched: Vec::new(),
        }
    }
}

impl HostSchedCtx for CpuCtx {
    fn current_cpu(&self) -> CpuId {
        self.cpu
    }

    fn nr_cpus(&self) -> u32 {
        self.nr_cpus
    }

    fn task_weight(&self, _task: TaskId) -> Weight {
        Weight::NORMAL
    }

    fn task_vtime(&self, _task: TaskId) -> u64 {
        0
    }

    fn set_task_vtime(&mut self, _task: TaskId, _vtime: u64) {}

    fn dispatch_local(&mut self, cpu: CpuId, entry: DsqEntry) {
        assert_eq!(cpu, self.cpu, "dispatched to a foreign CPU");
        self.dispatched.push(entry);
    }

    fn switch_tasks(&mut self, _mode: SwitchMode) -> Result<(), SchedError> {
        Ok(())
    }
}
