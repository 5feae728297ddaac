//! Audit event types

use chrono::{DateTime, Utc};
use pacer_api::{BlockingReason, ResetScope, SpendTotals};
use pacer_util::{BrandId, CampaignId, RunId, SpendLogId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Spend appended to the ledger and added to the brand counters
    SpendRecorded {
        spend_log_id: SpendLogId,
        campaign_id: CampaignId,
        brand_id: BrandId,
        amount: Decimal,
    },

    /// Campaign switched on
    CampaignActivated { campaign_id: CampaignId },

    /// Campaign switched off
    CampaignPaused {
        campaign_id: CampaignId,
        reasons: Vec<BlockingReason>,
    },

    /// Flag rewritten by a forced status update
    StatusForced { campaign_id: CampaignId, active: bool },

    /// Spend counters zeroed at a boundary
    CountersReset { brand_id: BrandId, scope: ResetScope },

    /// Counters overwritten with ledger totals after drift was detected
    CountersRepaired {
        brand_id: BrandId,
        stored: SpendTotals,
        ledger: SpendTotals,
    },

    /// A reconciliation job finished
    JobCompleted {
        run_id: RunId,
        job: String,
        summary: String,
        failures: usize,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: pacer_util::now(),
            event,
        }
    }
}
