/*
 * Module Lifecycle
 *
 *   Unloaded -> Initializing -> Active -> Exiting -> Unloaded
 *                    |
 *                    +--------(init failed)--------> Unloaded
 *
 * The state is a single atomic so any CPU can check it without a lock.
 * Transitions use compare-and-swap: a transition only happens from the
 * state it names, so two racing init calls cannot both win.
 */

use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::SchedError;

/// Module-level state
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ModuleState {
    Unloaded = 0,
    Initializing = 1,
    Active = 2,
    Exiting = 3,
}

impl ModuleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ModuleState::Initializing,
            2 => ModuleState::Active,
            3 => ModuleState::Exiting,
            _ => ModuleState::Unloaded,
        }
    }

    /// Whether `self -> to` is an edge of the state machine
    pub fn can_transition_to(self, to: ModuleState) -> bool {
        matches!(
            (self, to),
            (ModuleState::Unloaded, ModuleState::Initializing)
                | (ModuleState::Initializing, ModuleState::Active)
                | (ModuleState::Initializing, ModuleState::Unloaded)
                | (ModuleState::Active, ModuleState::Exiting)
                | (ModuleState::Exiting, ModuleState::Unloaded)
        )
    }
}

impl core::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ModuleState::Unloaded => "Unloaded",
            ModuleState::Initializing => "Initializing",
            ModuleState::Active => "Active",
            ModuleState::Exiting => "Exiting",
        };
        f.write_str(name)
    }
}

/// Atomic lifecycle state
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ModuleState::Unloaded as u8),
        }
    }

    pub fn state(&self) -> ModuleState {
        ModuleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == ModuleState::Active
    }

    /// Move `from -> to`, failing if the current state is not `from`
    pub fn transition(&self, from: ModuleState, to: ModuleState) -> Result<(), SchedError> {
        if !from.can_transition_to(to) {
            return Err(SchedError::InvalidTransition { from, to });
        }

        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| {
                log::debug!("[Lifecycle] {} -> {}", from, to);
            })
            .map_err(|actual| SchedError::InvalidTransition {
                from: ModuleState::from_u8(actual),
                to,
            })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
