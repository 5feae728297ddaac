//! Shared fixtures for unit tests

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use pacer_api::{
    Brand, BrandFields, Campaign, CampaignFields, CampaignFilter, DaypartingSchedule, NewBrand,
    NewCampaign, ResetScope, SpendLog, SpendTotals, TimeRange,
};
use pacer_store::{AuditEvent, CounterSnapshot, SqliteStore, Store, StoreError, StoreResult};
use pacer_util::{BrandId, CampaignId};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{AdmissionEngine, BudgetAccumulator, EngineOptions, Reconciler};

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// June 2025, on the hour
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    at_hm(day, hour, 0)
}

pub fn at_hm(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, min, 0).unwrap()
}

pub fn at_month(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
}

pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub accumulator: BudgetAccumulator,
    pub admission: AdmissionEngine,
    pub reconciler: Reconciler,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_clock(Tz::UTC)
    }

    pub fn with_clock(clock: Tz) -> Self {
        Self::build(Arc::new(SqliteStore::in_memory().unwrap()), clock)
    }

    /// Store whose active-flag writes fail for one campaign
    pub fn failing_on(campaign: CampaignId) -> Self {
        let store = FailingStore {
            inner: SqliteStore::in_memory().unwrap(),
            campaign,
        };
        Self::build(Arc::new(store), Tz::UTC)
    }

    fn build(store: Arc<dyn Store>, clock: Tz) -> Self {
        let options = EngineOptions {
            clock,
            ..EngineOptions::default()
        };
        Self {
            accumulator: BudgetAccumulator::new(store.clone(), options),
            admission: AdmissionEngine::new(store.clone()),
            reconciler: Reconciler::new(store.clone(), options),
            store,
        }
    }

    pub fn brand_with_campaign(&self, name: &str, daily: &str, monthly: &str) -> (Brand, Campaign) {
        let brand = self
            .store
            .create_brand(
                &NewBrand {
                    name: name.into(),
                    daily_budget: dec(daily),
                    monthly_budget: dec(monthly),
                },
                at(1, 0),
            )
            .unwrap();
        let campaign = self.campaign_for(&brand, "Spring Sale");
        (brand, campaign)
    }

    pub fn campaign_for(&self, brand: &Brand, name: &str) -> Campaign {
        self.store
            .create_campaign(&NewCampaign::new(brand.id, name), at(1, 0))
            .unwrap()
    }

    /// Campaign with a UTC window
    pub fn scheduled_campaign(
        &self,
        brand: &Brand,
        name: &str,
        start: (u32, u32),
        end: (u32, u32),
    ) -> Campaign {
        let schedule = DaypartingSchedule::new(
            NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            Tz::UTC,
        );
        self.store
            .create_campaign(&NewCampaign::new(brand.id, name).with_schedule(schedule), at(1, 0))
            .unwrap()
    }

    pub fn spend(&self, campaign: &Campaign, amount: &str) {
        self.accumulator
            .record_spend(campaign.id, dec(amount), None, at(10, 9))
            .unwrap();
    }

    pub fn deactivate(&self, campaign: &Campaign) {
        assert!(self
            .store
            .compare_and_set_active(campaign.id, true, false, at(10, 0))
            .unwrap());
    }

    pub fn campaign(&self, id: CampaignId) -> Campaign {
        self.store.get_campaign(id).unwrap().unwrap()
    }
}

struct FailingStore {
    inner: SqliteStore,
    campaign: CampaignId,
}

impl Store for FailingStore {
    fn create_brand(&self, brand: &NewBrand, now: DateTime<Utc>) -> StoreResult<Brand> {
        self.inner.create_brand(brand, now)
    }

    fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>> {
        self.inner.get_brand(id)
    }

    fn find_brand_by_name(&self, name: &str) -> StoreResult<Option<Brand>> {
        self.inner.find_brand_by_name(name)
    }

    fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        self.inner.list_brands()
    }

    fn save_brand(&self, brand: &Brand, fields: BrandFields) -> StoreResult<()> {
        self.inner.save_brand(brand, fields)
    }

    fn create_campaign(&self, campaign: &NewCampaign, now: DateTime<Utc>) -> StoreResult<Campaign> {
        self.inner.create_campaign(campaign, now)
    }

    fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        self.inner.get_campaign(id)
    }

    fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>> {
        self.inner.list_campaigns(filter)
    }

    fn save_campaign(&self, campaign: &Campaign, fields: CampaignFields) -> StoreResult<()> {
        self.inner.save_campaign(campaign, fields)
    }

    fn get_schedule(&self, id: CampaignId) -> StoreResult<Option<DaypartingSchedule>> {
        self.inner.get_schedule(id)
    }

    fn compare_and_set_active(
        &self,
        id: CampaignId,
        expected: bool,
        new: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        if id == self.campaign {
            return Err(StoreError::Database("injected failure".into()));
        }
        self.inner.compare_and_set_active(id, expected, new, now)
    }

    fn create_spend_log(
        &self,
        campaign: CampaignId,
        amount: Decimal,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<SpendLog> {
        self.inner.create_spend_log(campaign, amount, description, at)
    }

    fn sum_spend(&self, campaign: CampaignId, range: TimeRange) -> StoreResult<Decimal> {
        self.inner.sum_spend(campaign, range)
    }

    fn recent_spend_logs(&self, campaign: CampaignId, limit: usize) -> StoreResult<Vec<SpendLog>> {
        self.inner.recent_spend_logs(campaign, limit)
    }

    fn reset_spend(&self, brand: BrandId, scope: ResetScope, at: DateTime<Utc>) -> StoreResult<Brand> {
        self.inner.reset_spend(brand, scope, at)
    }

    fn counter_snapshot(&self, brand: BrandId) -> StoreResult<CounterSnapshot> {
        self.inner.counter_snapshot(brand)
    }

    fn compare_and_set_counters(
        &self,
        brand: BrandId,
        expected: SpendTotals,
        new: SpendTotals,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.compare_and_set_counters(brand, expected, new, now)
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.get_recent_audits(limit)
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}
