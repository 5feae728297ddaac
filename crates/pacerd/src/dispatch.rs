//! Job dispatch onto the blocking pool

use pacer_core::{JobGuard, JobKind, JobRun, Reconciler};
use std::sync::Arc;
use tracing::{error, info};

/// Runs reconciliation jobs without letting two runs of the same kind overlap
#[derive(Clone)]
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    guard: Arc<JobGuard>,
}

impl Dispatcher {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            guard: JobGuard::new(),
        }
    }

    /// Run `kind` now, or skip it if the previous run is still going.
    ///
    /// Returns `None` when skipped or when the job panicked.
    pub async fn fire(&self, kind: JobKind) -> Option<JobRun> {
        let Some(permit) = self.guard.try_acquire(kind) else {
            info!(job = %kind, "Previous run still in progress, skipping");
            return None;
        };

        let reconciler = self.reconciler.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            reconciler.run(kind, pacer_util::now())
        });

        match handle.await {
            Ok(run) => Some(run),
            Err(e) => {
                error!(job = %kind, error = %e, "Job task failed");
                None
            }
        }
    }

    pub fn guard(&self) -> &Arc<JobGuard> {
        &self.guard
    }
}
