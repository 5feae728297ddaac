//! Entity types for budget-pacer

use bitflags::bitflags;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use pacer_util::{BrandId, CampaignId, SpendLogId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest amount a single spend or budget may carry: 99,999,999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// A billing entity owning campaigns and budget limits.
///
/// The two `current_*` counters are running totals since the respective
/// window start. They are mutated only by recording spend or by a reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub daily_budget: Decimal,
    pub monthly_budget: Decimal,
    pub current_daily_spend: Decimal,
    pub current_monthly_spend: Decimal,
    /// Instant of the last daily reset (or creation)
    pub daily_window_start: DateTime<Utc>,
    /// Instant of the last monthly reset (or creation)
    pub monthly_window_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Brand {
    /// Budget left for today; negative once overspent
    pub fn daily_remaining(&self) -> Decimal {
        self.daily_budget - self.current_daily_spend
    }

    /// Budget left for this month; negative once overspent
    pub fn monthly_remaining(&self) -> Decimal {
        self.monthly_budget - self.current_monthly_spend
    }

    pub fn is_daily_exceeded(&self) -> bool {
        self.current_daily_spend >= self.daily_budget
    }

    pub fn is_monthly_exceeded(&self) -> bool {
        self.current_monthly_spend >= self.monthly_budget
    }

    /// Under both limits
    pub fn has_budget_remaining(&self) -> bool {
        !self.is_daily_exceeded() && !self.is_monthly_exceeded()
    }

    /// Current spend totals as a pair
    pub fn totals(&self) -> SpendTotals {
        SpendTotals {
            daily: self.current_daily_spend,
            monthly: self.current_monthly_spend,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Fields required to create a brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBrand {
    pub name: String,
    pub daily_budget: Decimal,
    pub monthly_budget: Decimal,
}

bitflags! {
    /// Administrative brand fields written by `save_brand`.
    ///
    /// Spend counters are not listed: they only move through spend
    /// recording and resets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BrandFields: u8 {
        const NAME = 1 << 0;
        const DAILY_BUDGET = 1 << 1;
        const MONTHLY_BUDGET = 1 << 2;
        const BUDGETS = Self::DAILY_BUDGET.bits() | Self::MONTHLY_BUDGET.bits();
    }
}

/// Daily and monthly spend, either stored or recomputed from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpendTotals {
    pub daily: Decimal,
    pub monthly: Decimal,
}

/// Which counters a reset touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Daily,
    Monthly,
    DailyAndMonthly,
}

impl ResetScope {
    pub fn includes_daily(&self) -> bool {
        matches!(self, ResetScope::Daily | ResetScope::DailyAndMonthly)
    }

    pub fn includes_monthly(&self) -> bool {
        matches!(self, ResetScope::Monthly | ResetScope::DailyAndMonthly)
    }
}

/// Recurring time-of-day window attached to a campaign.
///
/// When `start_time > end_time` the window wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaypartingSchedule {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub timezone: Tz,
}

impl DaypartingSchedule {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            start_time,
            end_time,
            timezone,
        }
    }

    /// Window crosses midnight (e.g. 22:00 - 06:00)
    pub fn is_overnight(&self) -> bool {
        self.start_time > self.end_time
    }
}

impl fmt::Display for DaypartingSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.start_time.format("%H:%M:%S"),
            self.end_time.format("%H:%M:%S"),
            self.timezone.name()
        )
    }
}

/// A unit of ad delivery belonging to one brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub brand_id: BrandId,
    pub name: String,
    pub is_active: bool,
    /// None means always eligible by time
    pub schedule: Option<DaypartingSchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn has_schedule(&self) -> bool {
        self.schedule.is_some()
    }
}

/// Fields required to create a campaign. Campaigns start active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub brand_id: BrandId,
    pub name: String,
    pub schedule: Option<DaypartingSchedule>,
}

impl NewCampaign {
    pub fn new(brand_id: BrandId, name: impl Into<String>) -> Self {
        Self {
            brand_id,
            name: name.into(),
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: DaypartingSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

bitflags! {
    /// Administrative campaign fields written by `save_campaign`.
    ///
    /// `is_active` is absent: it only changes through compare-and-set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CampaignFields: u8 {
        const NAME = 1 << 0;
        const SCHEDULE = 1 << 1;
    }
}

/// Filter for campaign listings. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub brand: Option<BrandId>,
    pub is_active: Option<bool>,
    pub has_schedule: Option<bool>,
}

impl CampaignFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn brand(mut self, brand: BrandId) -> Self {
        self.brand = Some(brand);
        self
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn scheduled(mut self, has_schedule: bool) -> Self {
        self.has_schedule = Some(has_schedule);
        self
    }

    pub fn matches(&self, campaign: &Campaign) -> bool {
        self.brand.is_none_or(|b| b == campaign.brand_id)
            && self.is_active.is_none_or(|a| a == campaign.is_active)
            && self.has_schedule.is_none_or(|s| s == campaign.has_schedule())
    }
}

/// Immutable record of one spend event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendLog {
    pub id: SpendLogId,
    pub campaign_id: CampaignId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
}

/// Half-open instant range `[start, end)` for ledger sums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Everything since the epoch up to `end`
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or(DateTime::<Utc>::MIN_UTC),
            end,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}
