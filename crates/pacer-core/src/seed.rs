//! Sync configured brands and campaigns into the store

use chrono::{DateTime, Utc};
use pacer_api::{BrandFields, CampaignFields, CampaignFilter, NewCampaign};
use pacer_config::BrandSeed;
use pacer_store::Store;
use tracing::info;

use crate::CoreResult;

/// Counts of what `apply_seeds` wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub brands_created: usize,
    pub brands_updated: usize,
    pub campaigns_created: usize,
    pub campaigns_updated: usize,
}

/// Create missing brands and campaigns, and update budgets and schedules of
/// existing ones. Spend counters and active flags are never touched.
pub fn apply_seeds(store: &dyn Store, seeds: &[BrandSeed], now: DateTime<Utc>) -> CoreResult<SeedReport> {
    let mut report = SeedReport::default();

    for seed in seeds {
        let brand = match store.find_brand_by_name(&seed.name)? {
            Some(mut brand) => {
                if brand.daily_budget != seed.daily_budget
                    || brand.monthly_budget != seed.monthly_budget
                {
                    brand.daily_budget = seed.daily_budget;
                    brand.monthly_budget = seed.monthly_budget;
                    store.save_brand(&brand, BrandFields::BUDGETS)?;
                    report.brands_updated += 1;
                    info!(brand_id = %brand.id, name = %brand.name, "Brand budgets updated from config");
                }
                brand
            }
            None => {
                let brand = store.create_brand(&seed.new_brand(), now)?;
                report.brands_created += 1;
                info!(brand_id = %brand.id, name = %brand.name, "Brand created from config");
                brand
            }
        };

        let existing = store.list_campaigns(&CampaignFilter::all().brand(brand.id))?;

        for campaign_seed in &seed.campaigns {
            match existing.iter().find(|c| c.name == campaign_seed.name) {
                Some(campaign) if campaign.schedule != campaign_seed.schedule => {
                    let mut campaign = campaign.clone();
                    campaign.schedule = campaign_seed.schedule;
                    store.save_campaign(&campaign, CampaignFields::SCHEDULE)?;
                    report.campaigns_updated += 1;
                    info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign schedule updated from config");
                }
                Some(_) => {}
                None => {
                    let mut new = NewCampaign::new(brand.id, &campaign_seed.name);
                    new.schedule = campaign_seed.schedule;
                    let campaign = store.create_campaign(&new, now)?;
                    report.campaigns_created += 1;
                    info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created from config");
                }
            }
        }
    }

    Ok(report)
}
