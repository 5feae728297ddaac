//! Admission verdicts and status transitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a campaign may not run right now.
///
/// Variants are declared in evaluation order; verdicts list reasons in
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    DailyBudgetExceeded,
    MonthlyBudgetExceeded,
    OutsideDaypartingWindow,
}

impl fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BlockingReason::DailyBudgetExceeded => "Daily budget exceeded",
            BlockingReason::MonthlyBudgetExceeded => "Monthly budget exceeded",
            BlockingReason::OutsideDaypartingWindow => "Outside dayparting window",
        };
        f.write_str(text)
    }
}

/// Should-run decision for one campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionVerdict {
    pub should_be_active: bool,
    pub reasons: Vec<BlockingReason>,
}

impl AdmissionVerdict {
    pub fn from_reasons(reasons: Vec<BlockingReason>) -> Self {
        Self {
            should_be_active: reasons.is_empty(),
            reasons,
        }
    }

    /// Reasons joined for human display, e.g. "Daily budget exceeded, Outside dayparting window"
    pub fn reasons_text(&self) -> String {
        join_reasons(&self.reasons)
    }
}

pub fn join_reasons(reasons: &[BlockingReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of a status update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusChange {
    /// Flag already matches the verdict
    Unchanged,
    /// Inactive campaign switched on after its constraints cleared
    Activated,
    /// Active campaign switched off
    Paused { reasons: Vec<BlockingReason> },
    /// Forced rewrite of a flag that already matched
    Forced { active: bool },
    /// Another writer changed the flag between read and write
    Superseded,
}

impl StatusChange {
    /// Whether the flag was written
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            StatusChange::Activated | StatusChange::Paused { .. } | StatusChange::Forced { .. }
        )
    }
}

impl fmt::Display for StatusChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusChange::Unchanged => f.write_str("No change needed"),
            StatusChange::Activated => f.write_str("Campaign activated (constraints cleared)"),
            StatusChange::Paused { reasons } => {
                write!(f, "Campaign paused ({})", join_reasons(reasons))
            }
            StatusChange::Forced { active } => write!(
                f,
                "Status forced to {}",
                if *active { "active" } else { "inactive" }
            ),
            StatusChange::Superseded => {
                f.write_str("No change made (status was updated concurrently)")
            }
        }
    }
}
