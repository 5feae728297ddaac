//! Budget accumulator: spend recording, counter resets and counter repair

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pacer_api::{Brand, MAX_AMOUNT, ResetScope, SpendTotals, TimeRange};
use pacer_config::ServiceSettings;
use pacer_store::{AuditEvent, AuditEventType, CounterSnapshot, Store, StoreError};
use pacer_util::{BrandId, CampaignId, SpendLogId};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{CoreError, CoreResult};

/// Cents; the ledger rejects finer amounts
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// Settings shared by the accumulator and the reconciliation jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Clock used for day and month boundaries
    pub clock: Tz,
    pub consistency_tolerance: Decimal,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            clock: Tz::UTC,
            consistency_tolerance: pacer_config::DEFAULT_CONSISTENCY_TOLERANCE,
        }
    }
}

impl From<&ServiceSettings> for EngineOptions {
    fn from(service: &ServiceSettings) -> Self {
        Self {
            clock: service.timezone,
            consistency_tolerance: service.consistency_tolerance,
        }
    }
}

/// Outcome of verifying one brand's counters against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterCheck {
    Consistent,
    Repaired { stored: SpendTotals, ledger: SpendTotals },
    /// Counters moved while repairing; retried on the next run
    Skipped,
}

/// Owns the only write paths into the brand spend counters
pub struct BudgetAccumulator {
    store: Arc<dyn Store>,
    options: EngineOptions,
}

impl BudgetAccumulator {
    pub fn new(store: Arc<dyn Store>, options: EngineOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn brand(&self, id: BrandId) -> CoreResult<Brand> {
        self.store.get_brand(id)?.ok_or(CoreError::BrandNotFound(id))
    }

    /// Append a spend log and add `amount` to the brand counters as one unit.
    ///
    /// Rejects negative amounts and sub-cent precision before touching the store.
    pub fn record_spend(
        &self,
        campaign: CampaignId,
        amount: Decimal,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<SpendLogId> {
        validate_amount(amount)?;

        let owner = self
            .store
            .get_campaign(campaign)?
            .ok_or(CoreError::CampaignNotFound(campaign))?;

        let log = self
            .store
            .create_spend_log(campaign, amount, description, now)
            .map_err(|e| match e {
                StoreError::NotFound(_) => CoreError::CampaignNotFound(campaign),
                StoreError::Overflow(msg) => CoreError::InvalidAmount(msg),
                other => other.into(),
            })?;

        info!(
            spend_log_id = %log.id,
            campaign_id = %campaign,
            brand_id = %owner.brand_id,
            amount = %amount,
            "Spend recorded"
        );

        self.audit(AuditEventType::SpendRecorded {
            spend_log_id: log.id,
            campaign_id: campaign,
            brand_id: owner.brand_id,
            amount,
        });

        Ok(log.id)
    }

    pub fn reset_daily(&self, brand: BrandId, now: DateTime<Utc>) -> CoreResult<Brand> {
        self.reset(brand, ResetScope::Daily, now)
    }

    pub fn reset_monthly(&self, brand: BrandId, now: DateTime<Utc>) -> CoreResult<Brand> {
        self.reset(brand, ResetScope::Monthly, now)
    }

    /// Zero the counters in `scope` and start new windows at `now`
    pub fn reset(&self, brand: BrandId, scope: ResetScope, now: DateTime<Utc>) -> CoreResult<Brand> {
        let reset = self
            .store
            .reset_spend(brand, scope, now)
            .map_err(|e| not_found_as_brand(e, brand))?;

        info!(brand_id = %brand, scope = ?scope, "Spend counters reset");
        self.audit(AuditEventType::CountersReset {
            brand_id: brand,
            scope,
        });

        Ok(reset)
    }

    /// Fail with `InconsistentCounters` when the snapshot drifted beyond tolerance
    pub fn check_consistency(&self, brand: BrandId, snapshot: &CounterSnapshot) -> CoreResult<()> {
        let tolerance = self.options.consistency_tolerance;
        let daily_drift = (snapshot.stored.daily - snapshot.ledger.daily).abs();
        let monthly_drift = (snapshot.stored.monthly - snapshot.ledger.monthly).abs();

        if daily_drift > tolerance || monthly_drift > tolerance {
            return Err(CoreError::InconsistentCounters {
                brand,
                stored: snapshot.stored,
                ledger: snapshot.ledger,
            });
        }
        Ok(())
    }

    /// Compare stored counters with the ledger and repair drift.
    ///
    /// The repair is keyed on the snapshot's stored values, so spend recorded
    /// or a reset applied in between makes it a no-op.
    pub fn verify_counters(&self, brand: BrandId, now: DateTime<Utc>) -> CoreResult<CounterCheck> {
        let snapshot = self
            .store
            .counter_snapshot(brand)
            .map_err(|e| not_found_as_brand(e, brand))?;

        match self.check_consistency(brand, &snapshot) {
            Ok(()) => {
                debug!(brand_id = %brand, "Counters consistent with ledger");
                Ok(CounterCheck::Consistent)
            }
            Err(e @ CoreError::InconsistentCounters { .. }) => {
                warn!(error = %e, "Counter drift detected");

                let repaired = self.store.compare_and_set_counters(
                    brand,
                    snapshot.stored,
                    snapshot.ledger,
                    now,
                )?;
                if !repaired {
                    warn!(brand_id = %brand, "Counters changed during repair, skipping");
                    return Ok(CounterCheck::Skipped);
                }

                info!(
                    brand_id = %brand,
                    daily = %snapshot.ledger.daily,
                    monthly = %snapshot.ledger.monthly,
                    "Counters repaired from ledger"
                );
                self.audit(AuditEventType::CountersRepaired {
                    brand_id: brand,
                    stored: snapshot.stored,
                    ledger: snapshot.ledger,
                });

                Ok(CounterCheck::Repaired {
                    stored: snapshot.stored,
                    ledger: snapshot.ledger,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Ledger spend of a campaign during the current day of the clock
    pub fn spend_today(&self, campaign: CampaignId, now: DateTime<Utc>) -> CoreResult<Decimal> {
        let clock = self.options.clock;
        let today = TimeRange::new(
            pacer_util::start_of_day(now, clock),
            pacer_util::next_midnight(now, clock),
        );
        Ok(self.store.sum_spend(campaign, today)?)
    }

    /// All ledger spend of a campaign up to the end of the current day
    pub fn total_spend(&self, campaign: CampaignId, now: DateTime<Utc>) -> CoreResult<Decimal> {
        let end = pacer_util::next_midnight(now, self.options.clock);
        Ok(self.store.sum_spend(campaign, TimeRange::until(end))?)
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

/// Reject negative amounts, amounts finer than cents and amounts above
/// `MAX_AMOUNT`
pub fn validate_amount(amount: Decimal) -> CoreResult<()> {
    if amount < Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "{amount} is negative"
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(CoreError::InvalidAmount(format!(
            "{amount} has more than {MAX_AMOUNT_SCALE} decimal places"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CoreError::InvalidAmount(format!(
            "{amount} exceeds the maximum of {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// Parse a textual amount such as "12.50"
pub fn parse_amount(text: &str) -> CoreResult<Decimal> {
    let amount = Decimal::from_str(text.trim())
        .map_err(|_| CoreError::InvalidAmount(format!("'{text}' is not a number")))?;
    validate_amount(amount)?;
    Ok(amount)
}

fn not_found_as_brand(e: StoreError, brand: BrandId) -> CoreError {
    match e {
        StoreError::NotFound(_) => CoreError::BrandNotFound(brand),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use std::thread;

    #[test]
    fn test_record_spend_sums_in_any_order() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100.00", "1000.00");

        for amount in ["12.50", "0.01", "40", "7.49"] {
            fx.accumulator
                .record_spend(campaign.id, dec(amount), None, at(10, 9))
                .unwrap();
        }

        let brand = fx.accumulator.brand(brand.id).unwrap();
        assert_eq!(brand.current_daily_spend, dec("60.00"));
        assert_eq!(brand.current_monthly_spend, dec("60.00"));
        assert_eq!(brand.daily_remaining(), dec("40.00"));
    }

    #[test]
    fn test_concurrent_spend_is_not_lost() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "1000", "10000");
        let accumulator = Arc::new(BudgetAccumulator::new(
            fx.store.clone(),
            EngineOptions::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let accumulator = accumulator.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        accumulator
                            .record_spend(campaign.id, dec("1.25"), None, at(10, 9))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let brand = accumulator.brand(brand.id).unwrap();
        assert_eq!(brand.current_daily_spend, dec("100.00"));
        let snapshot = fx.store.counter_snapshot(brand.id).unwrap();
        assert_eq!(snapshot.stored, snapshot.ledger);
    }

    #[test]
    fn test_concurrent_resets_and_spends_stay_consistent() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "1000", "10000");
        let accumulator = Arc::new(BudgetAccumulator::new(
            fx.store.clone(),
            EngineOptions::default(),
        ));

        let spenders = (0..4).map(|_| {
            let accumulator = accumulator.clone();
            thread::spawn(move || {
                for minute in 0..20 {
                    accumulator
                        .record_spend(campaign.id, dec("2.50"), None, at_hm(10, 9, minute))
                        .unwrap();
                }
            })
        });
        let resetters = (0..2).map(|_| {
            let accumulator = accumulator.clone();
            thread::spawn(move || {
                for minute in 0..20 {
                    accumulator
                        .reset(brand.id, ResetScope::DailyAndMonthly, at_hm(10, 9, minute))
                        .unwrap();
                }
            })
        });
        let handles: Vec<_> = spenders.chain(resetters).collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = fx.store.counter_snapshot(brand.id).unwrap();
        assert_eq!(snapshot.stored, snapshot.ledger);
        assert!(accumulator.check_consistency(brand.id, &snapshot).is_ok());
        assert_eq!(fx.store.recent_spend_logs(campaign.id, 100).unwrap().len(), 80);
    }

    #[test]
    fn test_largest_amount_is_accepted_repeatedly() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");

        for _ in 0..2 {
            fx.accumulator
                .record_spend(campaign.id, MAX_AMOUNT, None, at(10, 9))
                .unwrap();
        }

        let brand = fx.accumulator.brand(brand.id).unwrap();
        assert_eq!(brand.current_daily_spend, dec("199999999.98"));
        assert!(brand.is_daily_exceeded());
    }

    #[test]
    fn test_oversized_amount_is_rejected_and_store_stays_usable() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");

        for _ in 0..2 {
            let result = fx
                .accumulator
                .record_spend(campaign.id, Decimal::MAX, None, at(10, 9));
            assert!(matches!(result, Err(CoreError::InvalidAmount(_))));
        }

        let brand = fx.accumulator.brand(brand.id).unwrap();
        assert_eq!(brand.current_daily_spend, Decimal::ZERO);
        assert!(fx.store.is_healthy());
    }

    #[test]
    fn test_negative_amount_is_rejected_without_mutation() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");

        let result = fx
            .accumulator
            .record_spend(campaign.id, dec("-0.01"), None, at(10, 9));
        assert!(matches!(result, Err(CoreError::InvalidAmount(_))));

        let brand = fx.accumulator.brand(brand.id).unwrap();
        assert_eq!(brand.current_daily_spend, Decimal::ZERO);
        assert!(fx.store.recent_spend_logs(campaign.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_amount_validation() {
        assert!(validate_amount(Decimal::ZERO).is_ok());
        assert!(validate_amount(dec("1.500")).is_ok());
        assert!(matches!(validate_amount(dec("1.005")), Err(CoreError::InvalidAmount(_))));
        assert!(validate_amount(dec("99999999.99")).is_ok());
        assert!(matches!(
            validate_amount(dec("100000000.00")),
            Err(CoreError::InvalidAmount(_))
        ));

        assert_eq!(parse_amount(" 12.50 ").unwrap(), dec("12.50"));
        assert!(matches!(parse_amount("twelve"), Err(CoreError::InvalidAmount(_))));
        assert!(matches!(parse_amount("-3"), Err(CoreError::InvalidAmount(_))));
    }

    #[test]
    fn test_unknown_campaign() {
        let fx = Fixture::new();
        let result = fx
            .accumulator
            .record_spend(CampaignId::new(42), dec("1"), None, at(10, 9));
        assert!(matches!(result, Err(CoreError::CampaignNotFound(id)) if id == CampaignId::new(42)));
    }

    #[test]
    fn test_resets() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        fx.accumulator
            .record_spend(campaign.id, dec("30"), Some("banner"), at(10, 9))
            .unwrap();

        let after_daily = fx.accumulator.reset_daily(brand.id, at(11, 0)).unwrap();
        assert_eq!(after_daily.current_daily_spend, Decimal::ZERO);
        assert_eq!(after_daily.current_monthly_spend, dec("30"));

        let after_monthly = fx.accumulator.reset_monthly(brand.id, at(11, 0)).unwrap();
        assert_eq!(after_monthly.current_monthly_spend, Decimal::ZERO);

        assert!(matches!(
            fx.accumulator.reset_daily(BrandId::new(99), at(11, 0)),
            Err(CoreError::BrandNotFound(_))
        ));
    }

    #[test]
    fn test_verify_counters_consistent_after_normal_use() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        fx.accumulator
            .record_spend(campaign.id, dec("30"), None, at(10, 9))
            .unwrap();
        fx.accumulator.reset_daily(brand.id, at(11, 0)).unwrap();
        fx.accumulator
            .record_spend(campaign.id, dec("5"), None, at(11, 9))
            .unwrap();

        assert_eq!(
            fx.accumulator.verify_counters(brand.id, at(11, 10)).unwrap(),
            CounterCheck::Consistent
        );
    }

    #[test]
    fn test_verify_counters_repairs_drift() {
        let fx = Fixture::new();
        let (brand, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        fx.accumulator
            .record_spend(campaign.id, dec("30"), None, at(10, 9))
            .unwrap();

        // Simulate a lost increment
        let drifted = SpendTotals { daily: dec("10"), monthly: dec("10") };
        let current = fx.accumulator.brand(brand.id).unwrap().totals();
        assert!(fx
            .store
            .compare_and_set_counters(brand.id, current, drifted, at(10, 9))
            .unwrap());

        let snapshot = fx.store.counter_snapshot(brand.id).unwrap();
        assert!(matches!(
            fx.accumulator.check_consistency(brand.id, &snapshot),
            Err(CoreError::InconsistentCounters { .. })
        ));

        let check = fx.accumulator.verify_counters(brand.id, at(10, 10)).unwrap();
        assert_eq!(
            check,
            CounterCheck::Repaired {
                stored: drifted,
                ledger: SpendTotals { daily: dec("30"), monthly: dec("30") },
            }
        );
        assert_eq!(fx.accumulator.brand(brand.id).unwrap().current_daily_spend, dec("30"));
    }

    #[test]
    fn test_drift_within_tolerance_is_accepted() {
        let fx = Fixture::new();
        let (brand, _) = fx.brand_with_campaign("Acme", "100", "1000");
        let snapshot = CounterSnapshot {
            stored: SpendTotals { daily: dec("10.01"), monthly: dec("10") },
            ledger: SpendTotals { daily: dec("10"), monthly: dec("10") },
        };
        assert!(fx.accumulator.check_consistency(brand.id, &snapshot).is_ok());
    }

    #[test]
    fn test_spend_today_and_total() {
        let fx = Fixture::new();
        let (_, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        fx.accumulator.record_spend(campaign.id, dec("4"), None, at(9, 23)).unwrap();
        fx.accumulator.record_spend(campaign.id, dec("6"), None, at(10, 1)).unwrap();

        assert_eq!(fx.accumulator.spend_today(campaign.id, at(10, 12)).unwrap(), dec("6"));
        assert_eq!(fx.accumulator.total_spend(campaign.id, at(10, 12)).unwrap(), dec("10"));
    }

    #[test]
    fn test_spend_recording_is_audited() {
        let fx = Fixture::new();
        let (_, campaign) = fx.brand_with_campaign("Acme", "100", "1000");
        fx.accumulator.record_spend(campaign.id, dec("4"), None, at(10, 1)).unwrap();

        let audits = fx.store.get_recent_audits(1).unwrap();
        assert!(matches!(
            audits[0].event,
            AuditEventType::SpendRecorded { campaign_id, .. } if campaign_id == campaign.id
        ));
    }
}
