//! SQLite-based store implementation

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use pacer_api::{
    Brand, BrandFields, Campaign, CampaignFields, CampaignFilter, DaypartingSchedule, NewBrand,
    NewCampaign, ResetScope, SpendLog, SpendTotals, TimeRange,
};
use pacer_util::{BrandId, CampaignId, SpendLogId};
use rusqlite::types::{ToSql, Type};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, CounterSnapshot, Store, StoreError, StoreResult};

/// Default time a call waits for a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BRAND_COLUMNS: &str = "id, name, daily_budget, monthly_budget, \
     current_daily_spend, current_monthly_spend, daily_window_start, \
     monthly_window_start, created_at, updated_at";

const CAMPAIGN_SELECT: &str = "SELECT c.id, c.brand_id, c.name, c.is_active, \
     c.created_at, c.updated_at, s.start_time, s.end_time, s.timezone \
     FROM campaigns c LEFT JOIN dayparting_schedules s ON s.campaign_id = c.id";

const BRAND_LEDGER_SINCE: &str = "SELECT l.amount FROM spend_logs l \
     JOIN campaigns c ON c.id = l.campaign_id \
     WHERE c.brand_id = ?1 AND l.timestamp >= ?2";

const BRAND_LATEST_SPEND: &str = "SELECT MAX(l.timestamp) FROM spend_logs l \
     JOIN campaigns c ON c.id = l.campaign_id \
     WHERE c.brand_id = ?1";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a store, bounding lock waits by `busy_timeout`
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Brands and their running counters. Amounts are decimal text.
            CREATE TABLE IF NOT EXISTS brands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                daily_budget TEXT NOT NULL,
                monthly_budget TEXT NOT NULL,
                current_daily_spend TEXT NOT NULL DEFAULT '0',
                current_monthly_spend TEXT NOT NULL DEFAULT '0',
                daily_window_start TEXT NOT NULL,
                monthly_window_start TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS campaigns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                brand_id INTEGER NOT NULL REFERENCES brands(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (brand_id, name)
            );

            -- At most one schedule per campaign
            CREATE TABLE IF NOT EXISTS dayparting_schedules (
                campaign_id INTEGER PRIMARY KEY REFERENCES campaigns(id) ON DELETE CASCADE,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                timezone TEXT NOT NULL DEFAULT 'UTC'
            );

            -- Spend ledger (append-only)
            CREATE TABLE IF NOT EXISTS spend_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                amount TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                description TEXT
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_campaigns_brand ON campaigns(brand_id);
            CREATE INDEX IF NOT EXISTS idx_spend_campaign_time ON spend_logs(campaign_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

// Column codecs. Timestamps use fixed-width RFC 3339 in UTC so text order
// equals time order.

fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fmt_time(t: &NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, format!("amount '{text}': {e}")))
}

fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("timestamp '{text}': {e}")))
}

fn time_col(row: &Row<'_>, idx: usize, text: &str) -> rusqlite::Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .map_err(|e| conversion_error(idx, format!("time '{text}': {e}")))
}

fn brand_from_row(row: &Row<'_>) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: BrandId::new(row.get(0)?),
        name: row.get(1)?,
        daily_budget: decimal_col(row, 2)?,
        monthly_budget: decimal_col(row, 3)?,
        current_daily_spend: decimal_col(row, 4)?,
        current_monthly_spend: decimal_col(row, 5)?,
        daily_window_start: timestamp_col(row, 6)?,
        monthly_window_start: timestamp_col(row, 7)?,
        created_at: timestamp_col(row, 8)?,
        updated_at: timestamp_col(row, 9)?,
    })
}

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let start: Option<String> = row.get(6)?;
    let schedule = match start {
        Some(start) => {
            let end: String = row.get(7)?;
            let zone: String = row.get(8)?;
            let timezone = Tz::from_str(&zone)
                .map_err(|_| conversion_error(8, format!("unknown timezone '{zone}'")))?;
            Some(DaypartingSchedule {
                start_time: time_col(row, 6, &start)?,
                end_time: time_col(row, 7, &end)?,
                timezone,
            })
        }
        None => None,
    };

    Ok(Campaign {
        id: CampaignId::new(row.get(0)?),
        brand_id: BrandId::new(row.get(1)?),
        name: row.get(2)?,
        is_active: row.get(3)?,
        schedule,
        created_at: timestamp_col(row, 4)?,
        updated_at: timestamp_col(row, 5)?,
    })
}

fn spend_log_from_row(row: &Row<'_>) -> rusqlite::Result<SpendLog> {
    Ok(SpendLog {
        id: SpendLogId::new(row.get(0)?),
        campaign_id: CampaignId::new(row.get(1)?),
        amount: decimal_col(row, 2)?,
        timestamp: timestamp_col(row, 3)?,
        description: row.get(4)?,
    })
}

fn load_brand(conn: &Connection, id: BrandId) -> StoreResult<Option<Brand>> {
    let brand = conn
        .query_row(
            &format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ?1"),
            [id.get()],
            brand_from_row,
        )
        .optional()?;
    Ok(brand)
}

fn load_campaign(conn: &Connection, id: CampaignId) -> StoreResult<Option<Campaign>> {
    let campaign = conn
        .query_row(
            &format!("{CAMPAIGN_SELECT} WHERE c.id = ?1"),
            [id.get()],
            campaign_from_row,
        )
        .optional()?;
    Ok(campaign)
}

fn sum_amounts<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> StoreResult<Decimal> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| decimal_col(row, 0))?;

    let mut total = Decimal::ZERO;
    for amount in rows {
        total = checked_add(total, amount?)?;
    }
    Ok(total)
}

fn checked_add(a: Decimal, b: Decimal) -> StoreResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| StoreError::Overflow(format!("{a} + {b}")))
}

fn write_schedule(
    conn: &Connection,
    id: CampaignId,
    schedule: Option<&DaypartingSchedule>,
) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM dayparting_schedules WHERE campaign_id = ?1",
        [id.get()],
    )?;
    if let Some(schedule) = schedule {
        conn.execute(
            "INSERT INTO dayparting_schedules (campaign_id, start_time, end_time, timezone) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id.get(),
                fmt_time(&schedule.start_time),
                fmt_time(&schedule.end_time),
                schedule.timezone.name()
            ],
        )?;
    }
    Ok(())
}

fn brand_not_found(id: BrandId) -> StoreError {
    StoreError::NotFound(format!("brand {id}"))
}

fn campaign_not_found(id: CampaignId) -> StoreError {
    StoreError::NotFound(format!("campaign {id}"))
}

impl Store for SqliteStore {
    fn create_brand(&self, brand: &NewBrand, now: DateTime<Utc>) -> StoreResult<Brand> {
        let conn = self.conn()?;
        let ts = fmt_ts(&now);

        conn.execute(
            "INSERT INTO brands (name, daily_budget, monthly_budget, daily_window_start, \
             monthly_window_start, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4, ?4, ?4)",
            params![
                brand.name,
                brand.daily_budget.to_string(),
                brand.monthly_budget.to_string(),
                ts
            ],
        )?;

        let id = BrandId::new(conn.last_insert_rowid());
        debug!(brand_id = %id, name = %brand.name, "Brand created");
        load_brand(&conn, id)?.ok_or_else(|| brand_not_found(id))
    }

    fn get_brand(&self, id: BrandId) -> StoreResult<Option<Brand>> {
        let conn = self.conn()?;
        load_brand(&conn, id)
    }

    fn find_brand_by_name(&self, name: &str) -> StoreResult<Option<Brand>> {
        let conn = self.conn()?;
        let brand = conn
            .query_row(
                &format!("SELECT {BRAND_COLUMNS} FROM brands WHERE name = ?1"),
                [name],
                brand_from_row,
            )
            .optional()?;
        Ok(brand)
    }

    fn list_brands(&self) -> StoreResult<Vec<Brand>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BRAND_COLUMNS} FROM brands ORDER BY name, id"
        ))?;
        let brands = stmt
            .query_map([], brand_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(brands)
    }

    fn save_brand(&self, brand: &Brand, fields: BrandFields) -> StoreResult<()> {
        let mut assignments = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if fields.contains(BrandFields::NAME) {
            values.push(Box::new(brand.name.clone()));
            assignments.push(format!("name = ?{}", values.len()));
        }
        if fields.contains(BrandFields::DAILY_BUDGET) {
            values.push(Box::new(brand.daily_budget.to_string()));
            assignments.push(format!("daily_budget = ?{}", values.len()));
        }
        if fields.contains(BrandFields::MONTHLY_BUDGET) {
            values.push(Box::new(brand.monthly_budget.to_string()));
            assignments.push(format!("monthly_budget = ?{}", values.len()));
        }
        if assignments.is_empty() {
            return Ok(());
        }

        values.push(Box::new(fmt_ts(&pacer_util::now())));
        assignments.push(format!("updated_at = ?{}", values.len()));
        values.push(Box::new(brand.id.get()));
        let sql = format!(
            "UPDATE brands SET {} WHERE id = ?{}",
            assignments.join(", "),
            values.len()
        );

        let conn = self.conn()?;
        let updated = conn.execute(&sql, params_from_iter(values.iter()))?;
        if updated == 0 {
            return Err(brand_not_found(brand.id));
        }

        debug!(brand_id = %brand.id, fields = ?fields, "Brand saved");
        Ok(())
    }

    fn create_campaign(&self, campaign: &NewCampaign, now: DateTime<Utc>) -> StoreResult<Campaign> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if load_brand(&tx, campaign.brand_id)?.is_none() {
            return Err(brand_not_found(campaign.brand_id));
        }

        let ts = fmt_ts(&now);
        tx.execute(
            "INSERT INTO campaigns (brand_id, name, is_active, created_at, updated_at) \
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![campaign.brand_id.get(), campaign.name, ts],
        )?;
        let id = CampaignId::new(tx.last_insert_rowid());
        write_schedule(&tx, id, campaign.schedule.as_ref())?;

        let created = load_campaign(&tx, id)?.ok_or_else(|| campaign_not_found(id))?;
        tx.commit()?;

        debug!(campaign_id = %id, brand_id = %campaign.brand_id, name = %campaign.name, "Campaign created");
        Ok(created)
    }

    fn get_campaign(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let conn = self.conn()?;
        load_campaign(&conn, id)
    }

    fn list_campaigns(&self, filter: &CampaignFilter) -> StoreResult<Vec<Campaign>> {
        let mut sql = format!("{CAMPAIGN_SELECT} WHERE 1 = 1");
        let mut values: Vec<i64> = Vec::new();

        if let Some(brand) = filter.brand {
            values.push(brand.get());
            sql.push_str(&format!(" AND c.brand_id = ?{}", values.len()));
        }
        if let Some(is_active) = filter.is_active {
            values.push(i64::from(is_active));
            sql.push_str(&format!(" AND c.is_active = ?{}", values.len()));
        }
        match filter.has_schedule {
            Some(true) => sql.push_str(" AND s.campaign_id IS NOT NULL"),
            Some(false) => sql.push_str(" AND s.campaign_id IS NULL"),
            None => {}
        }
        sql.push_str(" ORDER BY c.name, c.id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let campaigns = stmt
            .query_map(params_from_iter(values.iter()), campaign_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(campaigns)
    }

    fn save_campaign(&self, campaign: &Campaign, fields: CampaignFields) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            "UPDATE campaigns SET updated_at = ?1 WHERE id = ?2",
            params![fmt_ts(&pacer_util::now()), campaign.id.get()],
        )?;
        if updated == 0 {
            return Err(campaign_not_found(campaign.id));
        }

        if fields.contains(CampaignFields::NAME) {
            tx.execute(
                "UPDATE campaigns SET name = ?1 WHERE id = ?2",
                params![campaign.name, campaign.id.get()],
            )?;
        }
        if fields.contains(CampaignFields::SCHEDULE) {
            write_schedule(&tx, campaign.id, campaign.schedule.as_ref())?;
        }

        tx.commit()?;
        debug!(campaign_id = %campaign.id, fields = ?fields, "Campaign saved");
        Ok(())
    }

    fn get_schedule(&self, id: CampaignId) -> StoreResult<Option<DaypartingSchedule>> {
        let conn = self.conn()?;
        let campaign = load_campaign(&conn, id)?.ok_or_else(|| campaign_not_found(id))?;
        Ok(campaign.schedule)
    }

    fn compare_and_set_active(
        &self,
        id: CampaignId,
        expected: bool,
        new: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE campaigns SET is_active = ?1, updated_at = ?2 WHERE id = ?3 AND is_active = ?4",
            params![new, fmt_ts(&now), id.get(), expected],
        )?;
        if updated == 1 {
            return Ok(true);
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM campaigns WHERE id = ?1)",
            [id.get()],
            |row| row.get(0),
        )?;
        if exists {
            debug!(campaign_id = %id, expected, "Active flag moved, compare-and-set lost");
            Ok(false)
        } else {
            Err(campaign_not_found(id))
        }
    }

    fn create_spend_log(
        &self,
        campaign: CampaignId,
        amount: Decimal,
        description: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<SpendLog> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let brand_id: Option<i64> = tx
            .query_row(
                "SELECT brand_id FROM campaigns WHERE id = ?1",
                [campaign.get()],
                |row| row.get(0),
            )
            .optional()?;
        let brand_id = BrandId::new(brand_id.ok_or_else(|| campaign_not_found(campaign))?);
        let brand = load_brand(&tx, brand_id)?.ok_or_else(|| brand_not_found(brand_id))?;

        // Never stamp a log before the current windows, so the counters keep
        // equalling the ledger sums since the window starts.
        let timestamp = at
            .max(brand.daily_window_start)
            .max(brand.monthly_window_start);

        tx.execute(
            "INSERT INTO spend_logs (campaign_id, amount, timestamp, description) \
             VALUES (?1, ?2, ?3, ?4)",
            params![campaign.get(), amount.to_string(), fmt_ts(&timestamp), description],
        )?;
        let id = SpendLogId::new(tx.last_insert_rowid());

        // Dropping the transaction on overflow rolls the insert back
        let daily = checked_add(brand.current_daily_spend, amount)?;
        let monthly = checked_add(brand.current_monthly_spend, amount)?;

        tx.execute(
            "UPDATE brands SET current_daily_spend = ?1, current_monthly_spend = ?2, \
             updated_at = ?3 WHERE id = ?4",
            params![
                daily.to_string(),
                monthly.to_string(),
                fmt_ts(&timestamp),
                brand_id.get()
            ],
        )?;

        tx.commit()?;

        debug!(
            spend_log_id = %id,
            campaign_id = %campaign,
            brand_id = %brand_id,
            amount = %amount,
            "Spend log appended"
        );

        Ok(SpendLog {
            id,
            campaign_id: campaign,
            amount,
            timestamp,
            description: description.map(str::to_string),
        })
    }

    fn sum_spend(&self, campaign: CampaignId, range: TimeRange) -> StoreResult<Decimal> {
        let conn = self.conn()?;
        sum_amounts(
            &conn,
            "SELECT amount FROM spend_logs WHERE campaign_id = ?1 AND timestamp >= ?2 AND timestamp < ?3",
            params![campaign.get(), fmt_ts(&range.start), fmt_ts(&range.end)],
        )
    }

    fn recent_spend_logs(&self, campaign: CampaignId, limit: usize) -> StoreResult<Vec<SpendLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, campaign_id, amount, timestamp, description FROM spend_logs \
             WHERE campaign_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
        )?;
        let logs = stmt
            .query_map(params![campaign.get(), limit as i64], spend_log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn reset_spend(&self, brand: BrandId, scope: ResetScope, at: DateTime<Utc>) -> StoreResult<Brand> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // A spend committed before the reset may carry a later stamp than
        // `at`; the new window must start after it or the ledger would
        // still count what the counter just dropped.
        let latest: Option<DateTime<Utc>> = tx
            .query_row(BRAND_LATEST_SPEND, [brand.get()], |row| {
                match row.get::<_, Option<String>>(0)? {
                    Some(_) => timestamp_col(row, 0).map(Some),
                    None => Ok(None),
                }
            })?;
        let start = match latest {
            Some(latest) if latest >= at => latest + chrono::Duration::microseconds(1),
            _ => at,
        };
        let ts = fmt_ts(&start);
        let zero = Decimal::ZERO.to_string();

        let mut assignments = vec!["updated_at = ?2"];
        if scope.includes_daily() {
            assignments.push("current_daily_spend = ?1");
            assignments.push("daily_window_start = ?2");
        }
        if scope.includes_monthly() {
            assignments.push("current_monthly_spend = ?1");
            assignments.push("monthly_window_start = ?2");
        }
        let updated = tx.execute(
            &format!("UPDATE brands SET {} WHERE id = ?3", assignments.join(", ")),
            params![zero, ts, brand.get()],
        )?;
        if updated == 0 {
            return Err(brand_not_found(brand));
        }

        let reset = load_brand(&tx, brand)?.ok_or_else(|| brand_not_found(brand))?;
        tx.commit()?;

        debug!(brand_id = %brand, scope = ?scope, "Spend counters reset");
        Ok(reset)
    }

    fn counter_snapshot(&self, brand: BrandId) -> StoreResult<CounterSnapshot> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let stored = load_brand(&tx, brand)?.ok_or_else(|| brand_not_found(brand))?;
        let daily = sum_amounts(
            &tx,
            BRAND_LEDGER_SINCE,
            params![brand.get(), fmt_ts(&stored.daily_window_start)],
        )?;
        let monthly = sum_amounts(
            &tx,
            BRAND_LEDGER_SINCE,
            params![brand.get(), fmt_ts(&stored.monthly_window_start)],
        )?;
        tx.commit()?;

        Ok(CounterSnapshot {
            stored: stored.totals(),
            ledger: SpendTotals { daily, monthly },
        })
    }

    fn compare_and_set_counters(
        &self,
        brand: BrandId,
        expected: SpendTotals,
        new: SpendTotals,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_brand(&tx, brand)?.ok_or_else(|| brand_not_found(brand))?;
        if current.totals() != expected {
            debug!(brand_id = %brand, "Counters moved, compare-and-set lost");
            return Ok(false);
        }

        tx.execute(
            "UPDATE brands SET current_daily_spend = ?1, current_monthly_spend = ?2, \
             updated_at = ?3 WHERE id = ?4",
            params![
                new.daily.to_string(),
                new.monthly.to_string(),
                fmt_ts(&now),
                brand.get()
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?1, ?2)",
            params![fmt_ts(&event.timestamp), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp = timestamp_col(row, 1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, event_json) = row?;
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
