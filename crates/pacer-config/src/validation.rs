//! Configuration validation

use crate::schema::{RawBrand, RawCampaign, RawConfig, RawDayparting};
use chrono::NaiveTime;
use chrono_tz::Tz;
use pacer_api::MAX_AMOUNT;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Brand '{brand}': {message}")]
    BrandError { brand: String, message: String },

    #[error("Campaign '{campaign}' of brand '{brand}': {message}")]
    CampaignError {
        brand: String,
        campaign: String,
        message: String,
    },

    #[error("Duplicate brand name: {0}")]
    DuplicateBrand(String),

    #[error("Duplicate campaign '{campaign}' in brand '{brand}'")]
    DuplicateCampaign { brand: String, campaign: String },

    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Service config error: {0}")]
    ServiceError(String),
}

/// Validate a raw configuration, collecting every error
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = validate_service(config);

    let mut seen = HashSet::new();
    for brand in &config.brands {
        if !seen.insert(&brand.name) {
            errors.push(ValidationError::DuplicateBrand(brand.name.clone()));
        }
    }

    for brand in &config.brands {
        errors.extend(validate_brand(brand));
    }

    errors
}

fn validate_service(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let service = &config.service;

    if let Some(tz) = &service.timezone
        && parse_timezone(tz).is_err()
    {
        errors.push(ValidationError::UnknownTimezone(tz.clone()));
    }

    if service.busy_timeout_ms == Some(0) {
        errors.push(ValidationError::ServiceError(
            "busy_timeout_ms must be greater than 0".into(),
        ));
    }

    if let Some(tolerance) = &service.consistency_tolerance
        && let Err(e) = parse_tolerance(tolerance)
    {
        errors.push(ValidationError::ServiceError(format!(
            "consistency_tolerance: {e}"
        )));
    }

    errors
}

fn validate_brand(brand: &RawBrand) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let brand_error = |message: String| ValidationError::BrandError {
        brand: brand.name.clone(),
        message,
    };

    if brand.name.trim().is_empty() {
        errors.push(brand_error("name cannot be empty".into()));
    }
    if let Err(e) = parse_budget(&brand.daily_budget) {
        errors.push(brand_error(format!("daily_budget: {e}")));
    }
    if let Err(e) = parse_budget(&brand.monthly_budget) {
        errors.push(brand_error(format!("monthly_budget: {e}")));
    }

    let mut seen = HashSet::new();
    for campaign in &brand.campaigns {
        if !seen.insert(&campaign.name) {
            errors.push(ValidationError::DuplicateCampaign {
                brand: brand.name.clone(),
                campaign: campaign.name.clone(),
            });
        }
        errors.extend(validate_campaign(brand, campaign));
    }

    errors
}

fn validate_campaign(brand: &RawBrand, campaign: &RawCampaign) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if campaign.name.trim().is_empty() {
        errors.push(ValidationError::CampaignError {
            brand: brand.name.clone(),
            campaign: campaign.name.clone(),
            message: "name cannot be empty".into(),
        });
    }

    if let Some(window) = &campaign.dayparting {
        errors.extend(validate_dayparting(window));
    }

    errors
}

fn validate_dayparting(window: &RawDayparting) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for value in [&window.start, &window.end] {
        if let Err(e) = parse_time(value) {
            errors.push(ValidationError::InvalidTimeFormat {
                value: value.clone(),
                message: e,
            });
        }
    }

    if let Some(tz) = &window.timezone
        && parse_timezone(tz).is_err()
    {
        errors.push(ValidationError::UnknownTimezone(tz.clone()));
    }

    errors
}

/// Parse HH:MM or HH:MM:SS
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err("Expected HH:MM or HH:MM:SS format".into());
    }

    let hour: u32 = parts[0].parse().map_err(|_| "Invalid hour".to_string())?;
    let minute: u32 = parts[1].parse().map_err(|_| "Invalid minute".to_string())?;
    let second: u32 = match parts.get(2) {
        Some(sec) => sec.parse().map_err(|_| "Invalid second".to_string())?,
        None => 0,
    };

    if hour >= 24 {
        return Err("Hour must be 0-23".into());
    }
    if minute >= 60 {
        return Err("Minute must be 0-59".into());
    }
    if second >= 60 {
        return Err("Second must be 0-59".into());
    }

    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| "Invalid time".into())
}

/// Parse an IANA timezone name
pub fn parse_timezone(s: &str) -> Result<Tz, String> {
    Tz::from_str(s).map_err(|_| format!("Unknown timezone: {s}"))
}

/// Parse a non-negative amount with at most two decimal places
pub fn parse_budget(s: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(s.trim()).map_err(|_| format!("'{s}' is not a number"))?;
    if amount < Decimal::ZERO {
        return Err(format!("{amount} is negative"));
    }
    if amount.normalize().scale() > 2 {
        return Err(format!("{amount} has more than 2 decimal places"));
    }
    if amount > MAX_AMOUNT {
        return Err(format!("{amount} exceeds the maximum of {MAX_AMOUNT}"));
    }
    Ok(amount)
}

/// Parse a non-negative decimal
pub fn parse_tolerance(s: &str) -> Result<Decimal, String> {
    let value = Decimal::from_str(s.trim()).map_err(|_| format!("'{s}' is not a number"))?;
    if value < Decimal::ZERO {
        return Err(format!("{value} is negative"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand(name: &str, daily: &str, campaigns: Vec<RawCampaign>) -> RawBrand {
        RawBrand {
            name: name.into(),
            daily_budget: daily.into(),
            monthly_budget: "1000".into(),
            campaigns,
        }
    }

    fn campaign(name: &str, window: Option<(&str, &str, Option<&str>)>) -> RawCampaign {
        RawCampaign {
            name: name.into(),
            dayparting: window.map(|(start, end, tz)| RawDayparting {
                start: start.into(),
                end: end.into(),
                timezone: tz.map(Into::into),
            }),
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:30").unwrap(), NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(parse_time("00:00:59").unwrap(), NaiveTime::from_hms_opt(0, 0, 59).unwrap());
        assert_eq!(parse_time("23:59").unwrap(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());

        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("12:00:60").is_err());
        assert!(parse_time("invalid").is_err());
    }

    #[test]
    fn test_parse_budget() {
        assert_eq!(parse_budget("100.00").unwrap(), Decimal::new(10000, 2));
        assert_eq!(parse_budget("0").unwrap(), Decimal::ZERO);
        assert!(parse_budget("-5").is_err());
        assert!(parse_budget("1.001").is_err());
        assert!(parse_budget("lots").is_err());
        assert_eq!(parse_budget("99999999.99").unwrap(), MAX_AMOUNT);
        assert!(parse_budget("100000000").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Rome").unwrap(), chrono_tz::Europe::Rome);
        assert!(parse_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_duplicate_names_detected() {
        let config = RawConfig {
            config_version: 1,
            brands: vec![
                brand(
                    "Acme",
                    "100",
                    vec![campaign("Spring", None), campaign("Spring", None)],
                ),
                brand("Acme", "50", vec![]),
            ],
            ..Default::default()
        };

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateBrand(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateCampaign { .. })));
    }

    #[test]
    fn test_same_campaign_name_in_different_brands_is_fine() {
        let config = RawConfig {
            config_version: 1,
            brands: vec![
                brand("Acme", "100", vec![campaign("Spring", None)]),
                brand("Globex", "100", vec![campaign("Spring", None)]),
            ],
            ..Default::default()
        };

        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RawConfig {
            config_version: 1,
            brands: vec![brand(
                "Acme",
                "-1",
                vec![campaign("Night", Some(("25:00", "06:00", Some("Nowhere/City"))))],
            )],
            ..Default::default()
        };
        config.service.busy_timeout_ms = Some(0);
        config.service.consistency_tolerance = Some("-0.5".into());

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidTimeFormat { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownTimezone(_))));
    }
}
