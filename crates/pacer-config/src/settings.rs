//! Validated settings

use crate::schema::{RawBrand, RawCampaign, RawConfig, RawJobsConfig, RawServiceConfig};
use crate::validation::{parse_budget, parse_time, parse_timezone, parse_tolerance};
use chrono_tz::Tz;
use pacer_api::{DaypartingSchedule, NewBrand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CONSISTENCY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CHECK_STATUS_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_VERIFY_COUNTERS_INTERVAL_SECS: u64 = 3600;

/// Validated settings ready for use by the service
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub jobs: JobSettings,
    pub brands: Vec<BrandSeed>,
}

impl Settings {
    /// Convert from raw config (after validation).
    ///
    /// Values that fail to parse fall back to their defaults; run
    /// `validate_config` first to reject them instead.
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceSettings::from_raw(raw.service),
            jobs: JobSettings::from_raw(raw.jobs),
            brands: raw.brands.into_iter().map(BrandSeed::from_raw).collect(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.service.data_dir.join(pacer_util::DATABASE_FILENAME)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub data_dir: PathBuf,
    /// Reconciliation clock
    pub timezone: Tz,
    pub busy_timeout: Duration,
    pub consistency_tolerance: Decimal,
    pub log_level: String,
}

impl ServiceSettings {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw
                .data_dir
                .unwrap_or_else(pacer_util::data_dir_without_env),
            timezone: raw
                .timezone
                .and_then(|tz| parse_timezone(&tz).ok())
                .unwrap_or(Tz::UTC),
            busy_timeout: Duration::from_millis(
                raw.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
            consistency_tolerance: raw
                .consistency_tolerance
                .and_then(|t| parse_tolerance(&t).ok())
                .unwrap_or(DEFAULT_CONSISTENCY_TOLERANCE),
            log_level: raw
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

/// Job intervals; `None` disables a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    pub check_status_interval: Option<Duration>,
    pub enforce_budgets_interval: Option<Duration>,
    pub enforce_dayparting_interval: Option<Duration>,
    pub verify_counters_interval: Option<Duration>,
    pub reset_at_midnight: bool,
}

impl JobSettings {
    fn from_raw(raw: RawJobsConfig) -> Self {
        Self {
            check_status_interval: interval(
                raw.check_status_interval_seconds
                    .unwrap_or(DEFAULT_CHECK_STATUS_INTERVAL_SECS),
            ),
            enforce_budgets_interval: interval(raw.enforce_budgets_interval_seconds.unwrap_or(0)),
            enforce_dayparting_interval: interval(
                raw.enforce_dayparting_interval_seconds.unwrap_or(0),
            ),
            verify_counters_interval: interval(
                raw.verify_counters_interval_seconds
                    .unwrap_or(DEFAULT_VERIFY_COUNTERS_INTERVAL_SECS),
            ),
            reset_at_midnight: raw.reset_at_midnight.unwrap_or(true),
        }
    }
}

fn interval(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

/// Brand to create or update on start
#[derive(Debug, Clone, PartialEq)]
pub struct BrandSeed {
    pub name: String,
    pub daily_budget: Decimal,
    pub monthly_budget: Decimal,
    pub campaigns: Vec<CampaignSeed>,
}

impl BrandSeed {
    fn from_raw(raw: RawBrand) -> Self {
        Self {
            daily_budget: parse_budget(&raw.daily_budget).unwrap_or_default(),
            monthly_budget: parse_budget(&raw.monthly_budget).unwrap_or_default(),
            campaigns: raw.campaigns.into_iter().map(CampaignSeed::from_raw).collect(),
            name: raw.name,
        }
    }

    pub fn new_brand(&self) -> NewBrand {
        NewBrand {
            name: self.name.clone(),
            daily_budget: self.daily_budget,
            monthly_budget: self.monthly_budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSeed {
    pub name: String,
    pub schedule: Option<DaypartingSchedule>,
}

impl CampaignSeed {
    fn from_raw(raw: RawCampaign) -> Self {
        let schedule = raw.dayparting.and_then(|window| {
            let start = parse_time(&window.start).ok()?;
            let end = parse_time(&window.end).ok()?;
            let timezone = match window.timezone {
                Some(tz) => parse_timezone(&tz).ok()?,
                None => Tz::UTC,
            };
            Some(DaypartingSchedule::new(start, end, timezone))
        });

        Self {
            name: raw.name,
            schedule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.service.timezone, Tz::UTC);
        assert_eq!(settings.service.busy_timeout, Duration::from_millis(5000));
        assert_eq!(settings.service.consistency_tolerance, Decimal::new(1, 2));
        assert_eq!(settings.service.log_level, "info");
        assert_eq!(settings.jobs.check_status_interval, Some(Duration::from_secs(300)));
        assert_eq!(settings.jobs.enforce_budgets_interval, None);
        assert_eq!(settings.jobs.enforce_dayparting_interval, None);
        assert_eq!(settings.jobs.verify_counters_interval, Some(Duration::from_secs(3600)));
        assert!(settings.jobs.reset_at_midnight);
        assert!(settings.brands.is_empty());
    }

    #[test]
    fn test_zero_interval_disables_job() {
        let raw = RawConfig {
            jobs: RawJobsConfig {
                check_status_interval_seconds: Some(0),
                enforce_budgets_interval_seconds: Some(60),
                ..Default::default()
            },
            ..Default::default()
        };
        let settings = Settings::from_raw(raw);
        assert_eq!(settings.jobs.check_status_interval, None);
        assert_eq!(settings.jobs.enforce_budgets_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_database_path() {
        let raw = RawConfig {
            service: RawServiceConfig {
                data_dir: Some(PathBuf::from("/var/lib/pacer")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            Settings::from_raw(raw).database_path(),
            PathBuf::from("/var/lib/pacer/pacer.db")
        );
    }
}
