/*
 * Scheduler Error Types
 *
 * Errors reported by the policy callbacks and by the host-side driver.
 * The framework ABI speaks in status codes (0 = success, negative errno on
 * failure), so every variant maps onto one through `errno()`.
 */

use crate::scheduler::ModuleState;

/// Linux errno values used in status codes
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;
const EPERM: i32 = 1;
const ENODEV: i32 = 19;
const ESTALE: i32 = 116;

/// Errors from scheduling policy operations
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Init was requested while the module is not unloaded
    AlreadyActive,
    /// Init was requested after this instance already exited
    SessionEnded,
    /// A scheduling callback was requested outside the Active state
    NotActive { state: ModuleState },
    /// The host refused to hand task scheduling over to the policy
    SwitchDenied,
    /// A CPU id outside the host's CPU range
    InvalidCpu { cpu: u32, nr_cpus: u32 },
    /// A state transition the lifecycle does not allow
    InvalidTransition { from: ModuleState, to: ModuleState },
}

impl SchedError {
    /// Status code handed back to the host framework
    pub fn errno(&self) -> i32 {
        match self {
            SchedError::AlreadyActive => -EBUSY,
            SchedError::SessionEnded => -ESTALE,
            SchedError::NotActive { .. } => -ENODEV,
            SchedError::SwitchDenied => -EPERM,
            SchedError::InvalidCpu { .. } => -EINVAL,
            SchedError::InvalidTransition { .. } => -EINVAL,
        }
    }
}

impl core::fmt::Display for SchedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SchedError::AlreadyActive => write!(f, "Scheduler already active"),
            SchedError::SessionEnded => write!(f, "Scheduler session already ended"),
            SchedError::NotActive { state } => write!(f, "Scheduler not active (state: {})", state),
            SchedError::SwitchDenied => write!(f, "Host denied scheduling takeover"),
            SchedError::InvalidCpu { cpu, nr_cpus } => {
                write!(f, "Invalid CPU {} (host has {} CPUs)", cpu, nr_cpus)
            }
            SchedError::InvalidTransition { from, to } => {
                write!(f, "Invalid lifecycle transition {} -> {}", from, to)
            }
        }
    }
}

/// Status code for a callback result (0 = success)
pub fn status_code(result: &Result<(), SchedError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.errno(),
    }
}
