/*
 * Exit Information
 *
 * When the host detaches the policy it hands over a structured exit reason.
 * The policy copies it into a UserExitInfo slot that the launcher reads after
 * the session ends.
 *
 * The slot is write-once: the first record wins and later writes leave it
 * untouched. The policy's lifecycle only lets one exit through per session,
 * so in practice it is written at most once. Before any exit it reads as
 * ExitStatus::NotExited, never as an empty record.
 */

use heapless::String;
use spin::Once;

/// Capacity of the exit reason
pub const EXIT_REASON_LEN: usize = 128;

/// Capacity of the exit message
pub const EXIT_MSG_LEN: usize = 1024;

/// Why the policy was detached
///
/// Values match the host framework's exit codes. Codes >= 1024 are errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum ExitKind {
    None = 0,
    /// The policy finished normally
    Done = 1,
    /// Unregistered from user space
    Unreg = 64,
    /// Unregistered by the policy itself
    UnregBpf = 65,
    /// Unregistered by the host
    UnregKern = 66,
    /// Sysrq request
    SysRq = 67,
    /// Runtime error
    Error = 1024,
    /// Error raised from inside the policy
    ErrorBpf = 1025,
    /// A runnable task stalled
    ErrorStall = 1026,
}

impl ExitKind {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        let kind = match code {
            0 => ExitKind::None,
            1 => ExitKind::Done,
            64 => ExitKind::Unreg,
            65 => ExitKind::UnregBpf,
            66 => ExitKind::UnregKern,
            67 => ExitKind::SysRq,
            1024 => ExitKind::Error,
            1025 => ExitKind::ErrorBpf,
            1026 => ExitKind::ErrorStall,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_error(self) -> bool {
        self.code() >= ExitKind::Error.code()
    }
}

/// Exit information as supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScxExitInfo<'a> {
    pub kind: ExitKind,
    pub reason: &'a str,
    pub msg: &'a str,
}

impl<'a> ScxExitInfo<'a> {
    pub fn new(kind: ExitKind, reason: &'a str, msg: &'a str) -> Self {
        Self { kind, reason, msg }
    }
}

/// Recorded copy of the exit information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRecord {
    pub kind: ExitKind,
    pub reason: String<EXIT_REASON_LEN>,
    pub msg: String<EXIT_MSG_LEN>,
}

impl ExitRecord {
    fn from_info(ei: &ScxExitInfo<'_>) -> Self {
        Self {
            kind: ei.kind,
            reason: truncated(ei.reason),
            msg: truncated(ei.msg),
        }
    }
}

/// State of the exit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus<'a> {
    NotExited,
    Exited(&'a ExitRecord),
}

/// Write-once exit record owned by the policy
#[derive(Debug)]
pub struct UserExitInfo {
    slot: Once<ExitRecord>,
}

impl UserExitInfo {
    pub const fn new() -> Self {
        Self { slot: Once::new() }
    }

    /// Copy `ei` into the slot
    ///
    /// Only the first call of a session has any effect.
    pub(crate) fn record(&self, ei: &ScxExitInfo<'_>) {
        self.slot.call_once(|| ExitRecord::from_info(ei));
    }

    pub fn status(&self) -> ExitStatus<'_> {
        match self.slot.get() {
            Some(record) => ExitStatus::Exited(record),
            None => ExitStatus::NotExited,
        }
    }

    pub fn exited(&self) -> bool {
        self.slot.is_completed()
    }

    /// Log the recorded exit for the launcher
    pub fn report(&self) {
        match self.status() {
            ExitStatus::NotExited => log::warn!("[Escalator] No exit recorded"),
            ExitStatus::Exited(rec) if rec.kind.is_error() => {
                log::error!("EXIT: {} ({:?})", rec.reason, rec.kind);
                if !rec.msg.is_empty() {
                    log::error!("{}", rec.msg);
                }
            }
            ExitStatus::Exited(rec) => {
                log::info!("EXIT: {} ({:?})", rec.reason, rec.kind);
                if !rec.msg.is_empty() {
                    log::info!("{}", rec.msg);
                }
            }
        }
    }
}

impl Default for UserExitInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy as much of `s` as fits, cutting on a char boundary
fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
