//! Admission decision engine

use chrono::{DateTime, Utc};
use pacer_api::{AdmissionVerdict, BlockingReason, Brand, Campaign, StatusChange};
use pacer_store::{AuditEvent, AuditEventType, Store};
use pacer_util::CampaignId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dayparting;
use crate::{CoreError, CoreResult};

/// Decide whether `campaign` should run at `now`.
///
/// Reasons are collected in a fixed order: daily budget, monthly budget,
/// then the dayparting window.
pub fn should_be_active(brand: &Brand, campaign: &Campaign, now: DateTime<Utc>) -> AdmissionVerdict {
    debug_assert_eq!(brand.id, campaign.brand_id);

    let mut reasons = Vec::new();

    if brand.is_daily_exceeded() {
        reasons.push(BlockingReason::DailyBudgetExceeded);
    }

    if brand.is_monthly_exceeded() {
        reasons.push(BlockingReason::MonthlyBudgetExceeded);
    }

    if !dayparting::is_active_now(campaign.schedule.as_ref(), now) {
        reasons.push(BlockingReason::OutsideDaypartingWindow);
    }

    AdmissionVerdict::from_reasons(reasons)
}

/// Result of `update_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub campaign_id: CampaignId,
    pub verdict: AdmissionVerdict,
    pub change: StatusChange,
}

impl StatusUpdate {
    /// Whether the active flag was written
    pub fn changed(&self) -> bool {
        self.change.is_change()
    }

    pub fn explanation(&self) -> String {
        self.change.to_string()
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.change)
    }
}

/// Applies admission verdicts to the campaign active flag
pub struct AdmissionEngine {
    store: Arc<dyn Store>,
}

impl AdmissionEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load a campaign together with its brand
    pub fn load(&self, id: CampaignId) -> CoreResult<(Campaign, Brand)> {
        let campaign = self
            .store
            .get_campaign(id)?
            .ok_or(CoreError::CampaignNotFound(id))?;
        let brand = self
            .store
            .get_brand(campaign.brand_id)?
            .ok_or(CoreError::BrandNotFound(campaign.brand_id))?;
        Ok((campaign, brand))
    }

    /// Read-only verdict for one campaign
    pub fn evaluate(&self, id: CampaignId, now: DateTime<Utc>) -> CoreResult<AdmissionVerdict> {
        let (campaign, brand) = self.load(id)?;
        Ok(should_be_active(&brand, &campaign, now))
    }

    /// Bring the active flag in line with the current verdict.
    ///
    /// Without `force` a flag that already matches is left alone. The write is
    /// a compare-and-set on the flag value read here; losing it reports
    /// `Superseded` and changes nothing.
    pub fn update_status(
        &self,
        id: CampaignId,
        force: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<StatusUpdate> {
        let (campaign, brand) = self.load(id)?;
        let verdict = should_be_active(&brand, &campaign, now);
        let target = verdict.should_be_active;

        if target == campaign.is_active && !force {
            debug!(campaign_id = %id, is_active = target, "No status change needed");
            return Ok(StatusUpdate {
                campaign_id: id,
                verdict,
                change: StatusChange::Unchanged,
            });
        }

        let change = match (campaign.is_active, target) {
            (false, true) => StatusChange::Activated,
            (true, false) => StatusChange::Paused {
                reasons: verdict.reasons.clone(),
            },
            (_, active) => StatusChange::Forced { active },
        };

        let change = if self.set_active(&campaign, &brand, target, &change, now)? {
            change
        } else {
            StatusChange::Superseded
        };

        Ok(StatusUpdate {
            campaign_id: id,
            verdict,
            change,
        })
    }

    /// Compare-and-set the flag from the value in `campaign` to `active`,
    /// logging and auditing `change` on success
    pub(crate) fn set_active(
        &self,
        campaign: &Campaign,
        brand: &Brand,
        active: bool,
        change: &StatusChange,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let swapped = self
            .store
            .compare_and_set_active(campaign.id, campaign.is_active, active, now)
            .map_err(|e| match e {
                pacer_store::StoreError::NotFound(_) => CoreError::CampaignNotFound(campaign.id),
                other => other.into(),
            })?;

        if !swapped {
            debug!(
                campaign_id = %campaign.id,
                expected = campaign.is_active,
                "Status updated concurrently, write skipped"
            );
            return Ok(false);
        }

        info!(
            campaign_id = %campaign.id,
            campaign = %campaign.name,
            brand = %brand.name,
            is_active = active,
            "{}",
            change
        );

        let event = match change {
            StatusChange::Activated => AuditEventType::CampaignActivated {
                campaign_id: campaign.id,
            },
            StatusChange::Paused { reasons } => AuditEventType::CampaignPaused {
                campaign_id: campaign.id,
                reasons: reasons.clone(),
            },
            _ => AuditEventType::StatusForced {
                campaign_id: campaign.id,
                active,
            },
        };
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }

        Ok(true)
    }
}
