//! Store trait definitions

use chrono::{DateTime, Utc};
use pacer_api::{
    Brand, BrandFields, Campaign, CampaignFields, CampaignFilter, DaypartingSchedule, NewBrand,
    NewCampaign, ResetScope, SpendLog, SpendTotals, TimeRange,
};
use pacer_util::{BrandId, CampaignId};
use rust_decimal::Decimal;

use crate::{AuditEvent, StoreResult};

/// Main store trait.
///
/// Every method is a single atomic unit: implementations must not leave a
/// partially applied write behind when they return an error.
pub trait Store: Send + Sync {
    // Brands

    /// Create a brand with zeroed counters; both windows start at `now`
    fn create_brand(&self, brand: &NewBrand, now: DateTime<Utc>) -> StoreResult<Brand>;

    fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>>;

    fn find_brand_by_name(&self, name: &str) -> StoreResult<Option<Brand>>;

    /// All brands, ordered by name
    fn list_brands(&self) -> StoreResult<Vec<Brand>>;

    /// Persist the selected administrative fields of `brand`
    fn save_brand(&self, brand: &Brand, fields: BrandFields) -> StoreResult<()>;

    // Campaigns

    /// Create a campaign; new campaigns are active
    fn create_campaign(&self, campaign: &NewCampaign, now: DateTime<Utc>) -> StoreResult<Campaign>;

    fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    /// Campaigns matching `filter`, ordered by name
    fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>>;

    /// Persist the selected administrative fields of `campaign`
    fn save_campaign(&self, campaign: &Campaign, fields: CampaignFields) -> StoreResult<()>;

    fn get_schedule(&self, id: CampaignId) -> StoreResult<Option<DaypartingSchedule>>;

    /// Set `is_active` to `new` only if it currently equals `expected`.
    ///
    /// Returns `false` when the flag no longer holds `expected`.
    fn compare_and_set_active(
        &self,
        id: CampaignId,
        expected: bool,
        new: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // Spend ledger

    /// Append a spend log stamped `at` and add `amount` to the owning
    /// brand's daily and monthly counters, as one transaction.
    fn create_spend_log(
        &self,
        campaign: CampaignId,
        amount: Decimal,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<SpendLog>;

    /// Sum of a campaign's spend logs with timestamps inside `range`
    fn sum_spend(&self, campaign: CampaignId, range: TimeRange) -> StoreResult<Decimal>;

    /// Most recent spend logs of a campaign, newest first
    fn recent_spend_logs(&self, campaign: CampaignId, limit: usize) -> StoreResult<Vec<SpendLog>>;

    // Counters

    /// Zero the counters named by `scope` and move their window start to `at`,
    /// or to just after the brand's latest spend log if that is later
    fn reset_spend(&self, brand: BrandId, scope: ResetScope, at: DateTime<Utc>) -> StoreResult<Brand>;

    /// Stored counters and ledger sums since the window starts, read
    /// from one consistent snapshot
    fn counter_snapshot(&self, brand: BrandId) -> StoreResult<CounterSnapshot>;

    /// Overwrite the counters with `new` only if they still equal `expected`
    fn compare_and_set_counters(
        &self,
        brand: BrandId,
        expected: SpendTotals,
        new: SpendTotals,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Counters as stored next to the totals recomputed from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub stored: SpendTotals,
    pub ledger: SpendTotals,
}
