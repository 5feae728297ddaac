//! Reconciliation jobs
//!
//! Each job walks every relevant brand or campaign and isolates failures per
//! entity: a failed write is recorded in the report and the batch carries on.
//! Re-running a job after a partial failure is safe because every write is
//! skipped when the state already matches.

use chrono::{DateTime, Utc};
use pacer_api::{Brand, Campaign, CampaignFilter, ResetScope, StatusChange};
use pacer_store::{AuditEvent, AuditEventType, Store};
use pacer_util::{BrandId, RunId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accumulator::{BudgetAccumulator, CounterCheck, EngineOptions};
use crate::admission::AdmissionEngine;
use crate::dayparting;
use crate::scheduler::JobKind;
use crate::{CoreError, CoreResult};

/// One entity a batch job failed to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub entity: String,
    pub error: String,
}

impl fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.error)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, verb: &str, items: &[String]) -> fmt::Result {
    write!(f, "{} {} campaigns: {}", verb, items.len(), items.join(", "))
}

fn write_failures(f: &mut fmt::Formatter<'_>, failures: &[EntityFailure]) -> fmt::Result {
    if failures.is_empty() {
        return Ok(());
    }
    let listed: Vec<String> = failures.iter().map(ToString::to_string).collect();
    write!(f, "; Failed {}: {}", failures.len(), listed.join(", "))
}

/// Result of `enforce_budgets`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetEnforcement {
    /// "campaign (brand)" labels
    pub paused: Vec<String>,
    pub failures: Vec<EntityFailure>,
}

impl fmt::Display for BudgetEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.paused.is_empty() {
            f.write_str("No campaigns paused")?;
        } else {
            write_list(f, "Paused", &self.paused)?;
        }
        write_failures(f, &self.failures)
    }
}

/// Result of `enforce_dayparting`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaypartingEnforcement {
    pub activated: Vec<String>,
    pub deactivated: Vec<String>,
    pub failures: Vec<EntityFailure>,
}

impl fmt::Display for DaypartingEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.activated.is_empty(), self.deactivated.is_empty()) {
            (true, true) => f.write_str("No dayparting changes made")?,
            (false, true) => write_list(f, "Activated", &self.activated)?,
            (true, false) => write_list(f, "Deactivated", &self.deactivated)?,
            (false, false) => {
                write_list(f, "Activated", &self.activated)?;
                f.write_str("; ")?;
                write_list(f, "Deactivated", &self.deactivated)?;
            }
        }
        write_failures(f, &self.failures)
    }
}

/// Result of `reset_spends`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendReset {
    pub brands_reset: usize,
    /// Whether the run also reset monthly counters
    pub monthly: bool,
    pub reactivated: Vec<String>,
    pub failures: Vec<EntityFailure>,
}

impl fmt::Display for SpendReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reset daily spends for {} brands", self.brands_reset)?;
        if self.monthly {
            write!(f, "; Reset monthly spends for {} brands", self.brands_reset)?;
        }
        if !self.reactivated.is_empty() {
            f.write_str("; ")?;
            write_list(f, "Reactivated", &self.reactivated)?;
        }
        write_failures(f, &self.failures)
    }
}

/// Result of `check_and_update_status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCheck {
    pub budgets: BudgetEnforcement,
    pub dayparting: DaypartingEnforcement,
}

impl fmt::Display for StatusCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Budget check: {}; Dayparting check: {}",
            self.budgets, self.dayparting
        )
    }
}

/// Result of `verify_counters`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterVerification {
    pub brands_checked: usize,
    pub repaired: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<EntityFailure>,
}

impl fmt::Display for CounterVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Verified counters for {} brands", self.brands_checked)?;
        if !self.repaired.is_empty() {
            write!(f, "; Repaired {}: {}", self.repaired.len(), self.repaired.join(", "))?;
        }
        if !self.skipped.is_empty() {
            write!(f, "; Skipped {}: {}", self.skipped.len(), self.skipped.join(", "))?;
        }
        write_failures(f, &self.failures)
    }
}

/// Report of any job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    EnforceBudgets(BudgetEnforcement),
    EnforceDayparting(DaypartingEnforcement),
    ResetSpends(SpendReset),
    CheckAndUpdateStatus(StatusCheck),
    VerifyCounters(CounterVerification),
}

impl JobReport {
    pub fn failures(&self) -> Vec<&EntityFailure> {
        match self {
            JobReport::EnforceBudgets(r) => r.failures.iter().collect(),
            JobReport::EnforceDayparting(r) => r.failures.iter().collect(),
            JobReport::ResetSpends(r) => r.failures.iter().collect(),
            JobReport::CheckAndUpdateStatus(r) => r
                .budgets
                .failures
                .iter()
                .chain(r.dayparting.failures.iter())
                .collect(),
            JobReport::VerifyCounters(r) => r.failures.iter().collect(),
        }
    }

    /// Some entities failed while the rest were processed
    pub fn is_partial(&self) -> bool {
        !self.failures().is_empty()
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobReport::EnforceBudgets(r) => r.fmt(f),
            JobReport::EnforceDayparting(r) => r.fmt(f),
            JobReport::ResetSpends(r) => r.fmt(f),
            JobReport::CheckAndUpdateStatus(r) => r.fmt(f),
            JobReport::VerifyCounters(r) => r.fmt(f),
        }
    }
}

/// A finished job invocation
#[derive(Debug, Clone)]
pub struct JobRun {
    pub run_id: RunId,
    pub kind: JobKind,
    pub report: JobReport,
}

fn label(campaign: &Campaign, brand: &Brand) -> String {
    format!("{} ({})", campaign.name, brand.name)
}

/// Per-run brand lookups, so each brand is read once per pass
struct BrandCache<'a> {
    store: &'a dyn Store,
    brands: HashMap<BrandId, Brand>,
}

impl<'a> BrandCache<'a> {
    fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            brands: HashMap::new(),
        }
    }

    fn get(&mut self, id: BrandId) -> CoreResult<&Brand> {
        if !self.brands.contains_key(&id) {
            let brand = self.store.get_brand(id)?.ok_or(CoreError::BrandNotFound(id))?;
            self.brands.insert(id, brand);
        }
        self.brands.get(&id).ok_or(CoreError::BrandNotFound(id))
    }
}

/// Runs the periodic reconciliation jobs against a store
pub struct Reconciler {
    store: Arc<dyn Store>,
    accumulator: BudgetAccumulator,
    admission: AdmissionEngine,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, options: EngineOptions) -> Self {
        info!(clock = %options.clock.name(), tolerance = %options.consistency_tolerance, "Reconciler initialized");

        Self {
            accumulator: BudgetAccumulator::new(store.clone(), options),
            admission: AdmissionEngine::new(store.clone()),
            store,
        }
    }

    pub fn accumulator(&self) -> &BudgetAccumulator {
        &self.accumulator
    }

    pub fn admission(&self) -> &AdmissionEngine {
        &self.admission
    }

    /// Run one job, tag it with a fresh run id and audit the outcome
    pub fn run(&self, kind: JobKind, now: DateTime<Utc>) -> JobRun {
        let run_id = RunId::new();
        debug!(run_id = %run_id, job = %kind, "Job started");

        let report = match kind {
            JobKind::EnforceBudgets => JobReport::EnforceBudgets(self.enforce_budgets(now)),
            JobKind::EnforceDayparting => JobReport::EnforceDayparting(self.enforce_dayparting(now)),
            JobKind::ResetSpends => JobReport::ResetSpends(self.reset_spends(now)),
            JobKind::CheckAndUpdateStatus => {
                JobReport::CheckAndUpdateStatus(self.check_and_update_status(now))
            }
            JobKind::VerifyCounters => JobReport::VerifyCounters(self.verify_counters(now)),
        };

        let failures = report.failures().len();
        let summary = report.to_string();
        if failures > 0 {
            warn!(run_id = %run_id, job = %kind, failures, summary = %summary, "Job completed with failures");
        } else {
            info!(run_id = %run_id, job = %kind, summary = %summary, "Job completed");
        }

        let event = AuditEventType::JobCompleted {
            run_id,
            job: kind.name().to_string(),
            summary,
            failures,
        };
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }

        JobRun {
            run_id,
            kind,
            report,
        }
    }

    /// Pause every active campaign of every brand over its daily or monthly budget
    pub fn enforce_budgets(&self, now: DateTime<Utc>) -> BudgetEnforcement {
        let mut report = BudgetEnforcement::default();

        let brands = match self.store.list_brands() {
            Ok(brands) => brands,
            Err(e) => {
                record_failure(&mut report.failures, "brands".into(), e.into());
                return report;
            }
        };

        for brand in brands.iter().filter(|b| !b.has_budget_remaining()) {
            let active = match self
                .store
                .list_campaigns(&CampaignFilter::all().brand(brand.id).active(true))
            {
                Ok(campaigns) => campaigns,
                Err(e) => {
                    record_failure(&mut report.failures, format!("brand {}", brand.name), e.into());
                    continue;
                }
            };

            for campaign in active {
                let verdict = crate::should_be_active(brand, &campaign, now);
                let change = StatusChange::Paused {
                    reasons: verdict.reasons,
                };
                match self.admission.set_active(&campaign, brand, false, &change, now) {
                    Ok(true) => report.paused.push(label(&campaign, brand)),
                    Ok(false) => {}
                    Err(e) => record_failure(&mut report.failures, label(&campaign, brand), e),
                }
            }
        }

        report
    }

    /// Flip scheduled campaigns according to their windows.
    ///
    /// Activation also requires both budgets to have room; deactivation when
    /// the window closes does not look at budgets.
    pub fn enforce_dayparting(&self, now: DateTime<Utc>) -> DaypartingEnforcement {
        let mut report = DaypartingEnforcement::default();

        let scheduled = match self.store.list_campaigns(&CampaignFilter::all().scheduled(true)) {
            Ok(campaigns) => campaigns,
            Err(e) => {
                record_failure(&mut report.failures, "scheduled campaigns".into(), e.into());
                return report;
            }
        };

        let mut brands = BrandCache::new(self.store.as_ref());

        for campaign in scheduled {
            let in_window = dayparting::is_active_now(campaign.schedule.as_ref(), now);
            if in_window == campaign.is_active {
                continue;
            }

            let brand = match brands.get(campaign.brand_id) {
                Ok(brand) => brand,
                Err(e) => {
                    record_failure(&mut report.failures, campaign.name.clone(), e);
                    continue;
                }
            };

            if in_window && !brand.has_budget_remaining() {
                debug!(campaign_id = %campaign.id, "In window but over budget, staying inactive");
                continue;
            }

            let change = if in_window {
                StatusChange::Activated
            } else {
                StatusChange::Paused {
                    reasons: vec![pacer_api::BlockingReason::OutsideDaypartingWindow],
                }
            };

            match self.admission.set_active(&campaign, brand, in_window, &change, now) {
                Ok(true) if in_window => report.activated.push(label(&campaign, brand)),
                Ok(true) => report.deactivated.push(label(&campaign, brand)),
                Ok(false) => {}
                Err(e) => record_failure(&mut report.failures, label(&campaign, brand), e),
            }
        }

        report
    }

    /// Reset every brand's daily counter, and monthly counters on the first
    /// day of the month, then reactivate inactive campaigns that are under
    /// both budgets and inside their window (if any).
    ///
    /// The reactivation pass reads brands after all resets have been applied.
    pub fn reset_spends(&self, now: DateTime<Utc>) -> SpendReset {
        let clock = self.accumulator.options().clock;
        let monthly = pacer_util::is_first_of_month(now, clock);
        let scope = if monthly {
            ResetScope::DailyAndMonthly
        } else {
            ResetScope::Daily
        };

        let mut report = SpendReset {
            monthly,
            ..SpendReset::default()
        };

        match self.store.list_brands() {
            Ok(brands) => {
                for brand in brands {
                    match self.accumulator.reset(brand.id, scope, now) {
                        Ok(_) => report.brands_reset += 1,
                        Err(e) => {
                            record_failure(&mut report.failures, format!("brand {}", brand.name), e)
                        }
                    }
                }
            }
            Err(e) => record_failure(&mut report.failures, "brands".into(), e.into()),
        }

        let inactive = match self.store.list_campaigns(&CampaignFilter::all().active(false)) {
            Ok(campaigns) => campaigns,
            Err(e) => {
                record_failure(&mut report.failures, "inactive campaigns".into(), e.into());
                return report;
            }
        };

        let mut brands = BrandCache::new(self.store.as_ref());

        for campaign in inactive {
            let brand = match brands.get(campaign.brand_id) {
                Ok(brand) => brand,
                Err(e) => {
                    record_failure(&mut report.failures, campaign.name.clone(), e);
                    continue;
                }
            };

            if !brand.has_budget_remaining() {
                continue;
            }
            if !dayparting::is_active_now(campaign.schedule.as_ref(), now) {
                continue;
            }

            match self
                .admission
                .set_active(&campaign, brand, true, &StatusChange::Activated, now)
            {
                Ok(true) => report.reactivated.push(label(&campaign, brand)),
                Ok(false) => {}
                Err(e) => record_failure(&mut report.failures, label(&campaign, brand), e),
            }
        }

        report
    }

    /// Budget enforcement followed by dayparting enforcement
    pub fn check_and_update_status(&self, now: DateTime<Utc>) -> StatusCheck {
        let budgets = self.enforce_budgets(now);
        let dayparting = self.enforce_dayparting(now);
        StatusCheck {
            budgets,
            dayparting,
        }
    }

    /// Compare every brand's counters with the ledger and repair drift
    pub fn verify_counters(&self, now: DateTime<Utc>) -> CounterVerification {
        let mut report = CounterVerification::default();

        let brands = match self.store.list_brands() {
            Ok(brands) => brands,
            Err(e) => {
                record_failure(&mut report.failures, "brands".into(), e.into());
                return report;
            }
        };

        for brand in brands {
            match self.accumulator.verify_counters(brand.id, now) {
                Ok(check) => {
                    report.brands_checked += 1;
                    match check {
                        CounterCheck::Consistent => {}
                        CounterCheck::Repaired { .. } => report.repaired.push(brand.name),
                        CounterCheck::Skipped => report.skipped.push(brand.name),
                    }
                }
                Err(e) => record_failure(&mut report.failures, format!("brand {}", brand.name), e),
            }
        }

        report
    }
}

fn record_failure(failures: &mut Vec<EntityFailure>, entity: String, error: CoreError) {
    warn!(entity = %entity, error = %error, "Entity failed during reconciliation");
    failures.push(EntityFailure {
        entity,
        error: error.to_string(),
    });
}
