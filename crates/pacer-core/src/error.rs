//! Error taxonomy for the core engine

use pacer_api::SpendTotals;
use pacer_store::StoreError;
use pacer_util::{BrandId, CampaignId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Rejected before any write
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Brand not found: {0}")]
    BrandNotFound(BrandId),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// Stored counters drifted from the ledger beyond the configured tolerance
    #[error(
        "Inconsistent counters for brand {brand}: stored daily {} / monthly {}, ledger daily {} / monthly {}",
        stored.daily, stored.monthly, ledger.daily, ledger.monthly
    )]
    InconsistentCounters {
        brand: BrandId,
        stored: SpendTotals,
        ledger: SpendTotals,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
