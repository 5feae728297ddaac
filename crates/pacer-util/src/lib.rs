//! Shared utilities for budget-pacer
//!
//! This crate provides:
//! - ID types (BrandId, CampaignId, SpendLogId, RunId)
//! - Clock utilities (mockable now, day/month boundaries, next midnight)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
