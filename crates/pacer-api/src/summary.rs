//! Read-only status views of brands and campaigns

use crate::{Brand, BlockingReason};
use pacer_util::{BrandId, CampaignId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Share of budget at which spend counts as "caution"
pub const CAUTION_PERCENT: Decimal = Decimal::from_parts(75, 0, 0, false, 0);

/// Share of budget at which spend counts as "warning"
pub const WARNING_PERCENT: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

/// Coarse colour band of a budget's usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetHealth {
    Healthy,
    Caution,
    Warning,
    Exceeded,
}

impl BudgetHealth {
    pub fn classify(spend: Decimal, budget: Decimal) -> Self {
        if spend >= budget {
            return BudgetHealth::Exceeded;
        }
        match percent_used(spend, budget) {
            p if p >= WARNING_PERCENT => BudgetHealth::Warning,
            p if p >= CAUTION_PERCENT => BudgetHealth::Caution,
            _ => BudgetHealth::Healthy,
        }
    }
}

/// Spend as a percentage of budget, rounded to one decimal. Zero budgets
/// report 0; a ratio too large to represent saturates at `Decimal::MAX`.
pub fn percent_used(spend: Decimal, budget: Decimal) -> Decimal {
    if budget <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    spend
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(budget))
        .map_or(Decimal::MAX, |percent| percent.round_dp(1))
}

/// One budget dimension (daily or monthly) of a brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub budget: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub exceeded: bool,
    pub percent_used: Decimal,
    pub health: BudgetHealth,
}

impl BudgetLine {
    pub fn new(budget: Decimal, spent: Decimal) -> Self {
        Self {
            budget,
            spent,
            remaining: budget - spent,
            exceeded: spent >= budget,
            percent_used: percent_used(spent, budget),
            health: BudgetHealth::classify(spent, budget),
        }
    }
}

/// Budget status of one brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandSummary {
    pub brand_id: BrandId,
    pub name: String,
    pub daily: BudgetLine,
    pub monthly: BudgetLine,
    pub active_campaigns: usize,
    pub total_campaigns: usize,
}

impl BrandSummary {
    pub fn new(brand: &Brand, active_campaigns: usize, total_campaigns: usize) -> Self {
        Self {
            brand_id: brand.id,
            name: brand.name.clone(),
            daily: BudgetLine::new(brand.daily_budget, brand.current_daily_spend),
            monthly: BudgetLine::new(brand.monthly_budget, brand.current_monthly_spend),
            active_campaigns,
            total_campaigns,
        }
    }
}

/// Delivery status of one campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: CampaignId,
    pub name: String,
    pub brand: String,
    pub is_active: bool,
    pub should_be_active: bool,
    pub blocking_reasons: Vec<BlockingReason>,
    pub spend_today: Decimal,
    pub total_spend: Decimal,
    pub has_dayparting: bool,
    pub in_dayparting_window: bool,
}
