//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Job intervals
    #[serde(default)]
    pub jobs: RawJobsConfig,

    /// Brands and campaigns to create or update on start
    #[serde(default)]
    pub brands: Vec<RawBrand>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Directory holding the database
    pub data_dir: Option<PathBuf>,

    /// IANA timezone for day and month boundaries (default: UTC)
    pub timezone: Option<String>,

    /// Storage lock wait per call, in milliseconds
    pub busy_timeout_ms: Option<u64>,

    /// Allowed drift between counters and the ledger, as a decimal string
    pub consistency_tolerance: Option<String>,

    pub log_level: Option<String>,
}

/// Job intervals in seconds; 0 disables a job
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawJobsConfig {
    pub check_status_interval_seconds: Option<u64>,
    pub enforce_budgets_interval_seconds: Option<u64>,
    pub enforce_dayparting_interval_seconds: Option<u64>,
    pub verify_counters_interval_seconds: Option<u64>,

    /// Run the spend reset at each midnight of the service timezone
    pub reset_at_midnight: Option<bool>,
}

/// Brand seed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawBrand {
    pub name: String,

    /// Decimal string, e.g. "100.00"
    pub daily_budget: String,

    /// Decimal string, e.g. "2500.00"
    pub monthly_budget: String,

    #[serde(default)]
    pub campaigns: Vec<RawCampaign>,
}

/// Campaign seed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCampaign {
    pub name: String,

    /// Optional time-of-day window
    pub dayparting: Option<RawDayparting>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawDayparting {
    /// HH:MM or HH:MM:SS
    pub start: String,

    /// HH:MM or HH:MM:SS
    pub end: String,

    /// IANA timezone (default: UTC)
    pub timezone: Option<String>,
}
