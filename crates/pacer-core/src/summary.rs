//! Read-only status views

use chrono::{DateTime, Utc};
use pacer_api::{BrandSummary, CampaignFilter, CampaignSummary};
use pacer_util::{BrandId, CampaignId};
use serde::{Deserialize, Serialize};

use crate::accumulator::BudgetAccumulator;
use crate::{CoreError, CoreResult, dayparting, should_be_active};

pub fn brand_summary(accumulator: &BudgetAccumulator, id: BrandId) -> CoreResult<BrandSummary> {
    let brand = accumulator.brand(id)?;
    let campaigns = accumulator
        .store()
        .list_campaigns(&CampaignFilter::all().brand(id))?;
    let active = campaigns.iter().filter(|c| c.is_active).count();

    Ok(BrandSummary::new(&brand, active, campaigns.len()))
}

pub fn campaign_summary(
    accumulator: &BudgetAccumulator,
    id: CampaignId,
    now: DateTime<Utc>,
) -> CoreResult<CampaignSummary> {
    let store = accumulator.store();
    let campaign = store.get_campaign(id)?.ok_or(CoreError::CampaignNotFound(id))?;
    let brand = accumulator.brand(campaign.brand_id)?;
    let verdict = should_be_active(&brand, &campaign, now);

    Ok(CampaignSummary {
        campaign_id: campaign.id,
        name: campaign.name.clone(),
        brand: brand.name.clone(),
        is_active: campaign.is_active,
        should_be_active: verdict.should_be_active,
        blocking_reasons: verdict.reasons,
        spend_today: accumulator.spend_today(id, now)?,
        total_spend: accumulator.total_spend(id, now)?,
        has_dayparting: campaign.has_schedule(),
        in_dayparting_window: dayparting::is_active_now(campaign.schedule.as_ref(), now),
    })
}

/// Every brand and campaign at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusOverview {
    pub generated_at: DateTime<Utc>,
    pub brands: Vec<BrandSummary>,
    pub campaigns: Vec<CampaignSummary>,
}

pub fn status_overview(accumulator: &BudgetAccumulator, now: DateTime<Utc>) -> CoreResult<StatusOverview> {
    let store = accumulator.store();

    let brands = store
        .list_brands()?
        .iter()
        .map(|b| brand_summary(accumulator, b.id))
        .collect::<CoreResult<Vec<_>>>()?;
    let campaigns = store
        .list_campaigns(&CampaignFilter::all())?
        .iter()
        .map(|c| campaign_summary(accumulator, c.id, now))
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(StatusOverview {
        generated_at: now,
        brands,
        campaigns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use pacer_api::{BlockingReason, BudgetHealth};

    #[test]
    fn test_brand_summary() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        let second = fx.campaign_for(&brand, "Banner");
        fx.spend(&campaign, "80");
        fx.deactivate(&second);

        let summary = brand_summary(&fx.accumulator, brand.id).unwrap();
        assert_eq!(summary.name, "Acme");
        assert_eq!(summary.daily.remaining, dec("20"));
        assert_eq!(summary.daily.health, BudgetHealth::Caution);
        assert_eq!(summary.monthly.health, BudgetHealth::Healthy);
        assert_eq!(summary.active_campaigns, 1);
        assert_eq!(summary.total_campaigns, 2);
    }

    #[test]
    fn test_campaign_summary() {
        let fx = Fixture::new();
        let (brand, _) = fx.brand_with_campaign("Acme", "100", "1000");
        let office = fx.scheduled_campaign(&brand, "Office", (9, 0), (17, 0));
        fx.spend(&office, "12.50");

        let summary = campaign_summary(&fx.accumulator, office.id, at(10, 20)).unwrap();
        assert_eq!(summary.brand, "Acme");
        assert!(summary.is_active);
        assert!(!summary.should_be_active);
        assert_eq!(summary.blocking_reasons, vec![BlockingReason::OutsideDaypartingWindow]);
        assert_eq!(summary.spend_today, dec("12.50"));
        assert_eq!(summary.total_spend, dec("12.50"));
        assert!(summary.has_dayparting);
        assert!(!summary.in_dayparting_window);
    }

    #[test]
    fn test_status_overview_serializes() {
        let fx = Fixture::new();
        fx.brand_with_campaign("Acme", "100", "1000");

        let overview = status_overview(&fx.accumulator, at(10, 12)).unwrap();
        assert_eq!(overview.brands.len(), 1);
        assert_eq!(overview.campaigns.len(), 1);

        let json = serde_json::to_string(&overview).unwrap();
        assert!(json.contains("\"Spring Sale\""));
    }
}
