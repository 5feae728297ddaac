//! Job kinds and the same-kind overlap guard

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Periodic reconciliation jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    EnforceBudgets,
    EnforceDayparting,
    ResetSpends,
    CheckAndUpdateStatus,
    VerifyCounters,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::EnforceBudgets,
        JobKind::EnforceDayparting,
        JobKind::ResetSpends,
        JobKind::CheckAndUpdateStatus,
        JobKind::VerifyCounters,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::EnforceBudgets => "enforce_budgets",
            JobKind::EnforceDayparting => "enforce_dayparting",
            JobKind::ResetSpends => "reset_spends",
            JobKind::CheckAndUpdateStatus => "check_and_update_status",
            JobKind::VerifyCounters => "verify_counters",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prevents two invocations of the same job kind from running at once.
///
/// Different kinds never block each other.
#[derive(Debug, Default)]
pub struct JobGuard {
    running: [AtomicBool; JobKind::ALL.len()],
}

impl JobGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim `kind`, or `None` if an invocation of it is still running.
    /// The claim is released when the permit drops.
    pub fn try_acquire(self: &Arc<Self>, kind: JobKind) -> Option<JobPermit> {
        self.running[kind.slot()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobPermit {
                guard: Arc::clone(self),
                kind,
            })
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.running[kind.slot()].load(Ordering::Acquire)
    }
}

/// Held for the duration of one job invocation
#[derive(Debug)]
pub struct JobPermit {
    guard: Arc<JobGuard>,
    kind: JobKind,
}

impl JobPermit {
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.guard.running[self.kind.slot()].store(false, Ordering::Release);
    }
}
