//! Long-running service: periodic jobs, midnight reset and signal handling

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pacer_config::JobSettings;
use pacer_core::JobKind;
use pacer_store::{AuditEvent, AuditEventType, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;

pub struct Service {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    jobs: JobSettings,
    clock: Tz,
}

impl Service {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher, jobs: JobSettings, clock: Tz) -> Self {
        Self {
            store,
            dispatcher,
            jobs,
            clock,
        }
    }

    pub async fn run(self) -> Result<()> {
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
        {
            warn!(error = %e, "Failed to log service start");
        }

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut check_status = job_interval(JobKind::CheckAndUpdateStatus, self.jobs.check_status_interval);
        let mut enforce_budgets = job_interval(JobKind::EnforceBudgets, self.jobs.enforce_budgets_interval);
        let mut enforce_dayparting =
            job_interval(JobKind::EnforceDayparting, self.jobs.enforce_dayparting_interval);
        let mut verify_counters = job_interval(JobKind::VerifyCounters, self.jobs.verify_counters_interval);

        let mut reset = ResetSchedule::new(self.clock, pacer_util::now());
        let midnight = tokio::time::sleep(reset.remaining(pacer_util::now()));
        tokio::pin!(midnight);

        info!(
            clock = %self.clock.name(),
            reset_at_midnight = self.jobs.reset_at_midnight,
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = tick(&mut check_status) => self.spawn(JobKind::CheckAndUpdateStatus),
                _ = tick(&mut enforce_budgets) => self.spawn(JobKind::EnforceBudgets),
                _ = tick(&mut enforce_dayparting) => self.spawn(JobKind::EnforceDayparting),
                _ = tick(&mut verify_counters) => self.spawn(JobKind::VerifyCounters),

                _ = &mut midnight, if self.jobs.reset_at_midnight => {
                    let now = pacer_util::now();
                    if reset.advance(now) {
                        self.spawn(JobKind::ResetSpends);
                    } else {
                        debug!("Reset timer fired before midnight, re-arming");
                    }
                    midnight.as_mut().reset(Instant::now() + reset.remaining(now));
                }
            }
        }

        info!("Shutting down pacerd");

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn spawn(&self, kind: JobKind) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.fire(kind).await;
        });
    }

}

/// Wall-clock deadline of the next midnight spend reset.
///
/// The sleep backing it is monotonic, so a wall-clock step can wake it
/// early; the deadline is checked against the wall clock before resetting.
struct ResetSchedule {
    clock: Tz,
    deadline: DateTime<Utc>,
}

impl ResetSchedule {
    fn new(clock: Tz, now: DateTime<Utc>) -> Self {
        let schedule = Self {
            clock,
            deadline: pacer_util::next_midnight(now, clock),
        };
        schedule.log_next();
        schedule
    }

    /// Time until the deadline; zero once it has passed
    fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Move to the following midnight if the deadline has passed
    fn advance(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.deadline {
            return false;
        }
        self.deadline = pacer_util::next_midnight(now, self.clock);
        self.log_next();
        true
    }

    fn log_next(&self) {
        debug!(
            next = %pacer_util::format_datetime_full(&self.deadline, self.clock),
            "Next spend reset scheduled"
        );
    }
}

fn job_interval(kind: JobKind, period: Option<Duration>) -> Option<Interval> {
    let period = period?;
    info!(job = %kind, seconds = period.as_secs(), "Job scheduled");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(interval)
}

/// Next tick of an enabled job; never resolves for a disabled one
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
