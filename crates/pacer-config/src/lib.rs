//! Configuration parsing and validation for budget-pacer
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Service settings (data directory, reconciliation timezone, timeouts)
//! - Job intervals
//! - Brand and campaign seeds with budgets and dayparting windows
//! - Validation with clear error messages

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading configuration");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal::Decimal;
    use std::io::Write;
    use std::time::Duration;

    const FULL: &str = r#"
        config_version = 1

        [service]
        data_dir = "/var/lib/pacer"
        timezone = "America/New_York"
        busy_timeout_ms = 2500
        consistency_tolerance = "0.05"
        log_level = "debug"

        [jobs]
        check_status_interval_seconds = 120
        enforce_dayparting_interval_seconds = 60
        verify_counters_interval_seconds = 0
        reset_at_midnight = false

        [[brands]]
        name = "Acme"
        daily_budget = "100.00"
        monthly_budget = "2500.00"

        [[brands.campaigns]]
        name = "Spring Sale"

        [[brands.campaigns]]
        name = "Night Owls"
        [brands.campaigns.dayparting]
        start = "22:00"
        end = "06:00:30"
        timezone = "Europe/Rome"
    "#;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();
        assert!(settings.brands.is_empty());
        assert_eq!(settings.service.timezone, chrono_tz::Tz::UTC);
    }

    #[test]
    fn parse_full_config() {
        let settings = parse_config(FULL).unwrap();

        assert_eq!(settings.service.timezone, chrono_tz::America::New_York);
        assert_eq!(settings.service.busy_timeout, Duration::from_millis(2500));
        assert_eq!(settings.service.consistency_tolerance, Decimal::new(5, 2));
        assert_eq!(settings.jobs.check_status_interval, Some(Duration::from_secs(120)));
        assert_eq!(settings.jobs.enforce_dayparting_interval, Some(Duration::from_secs(60)));
        assert_eq!(settings.jobs.verify_counters_interval, None);
        assert!(!settings.jobs.reset_at_midnight);

        let acme = &settings.brands[0];
        assert_eq!(acme.daily_budget, Decimal::new(10000, 2));
        assert_eq!(acme.campaigns.len(), 2);
        assert!(acme.campaigns[0].schedule.is_none());

        let night = acme.campaigns[1].schedule.unwrap();
        assert_eq!(night.start_time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(night.end_time, NaiveTime::from_hms_opt(6, 0, 30).unwrap());
        assert_eq!(night.timezone, chrono_tz::Europe::Rome);
        assert!(night.is_overnight());
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_budget() {
        let config = r#"
            config_version = 1

            [[brands]]
            name = "Acme"
            daily_budget = "ten"
            monthly_budget = "100"
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let settings = load_config(file.path()).unwrap();
        assert_eq!(settings.brands.len(), 1);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
