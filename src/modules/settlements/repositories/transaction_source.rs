use std::cmp::Ordering;
use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use tokio::sync::RwLock;

use crate::core::{AppError, Currency, Period, Result};
use crate::modules::allocations::models::ViewRecord;

/// Read-only access to the view records of a period
///
/// Pages are ordered by `(displayed_at, id)` so a run walks a stable
/// sequence as long as the feed does not change underneath it.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn count(&self, period: Period) -> Result<i64>;

    async fn fetch_page(&self, period: Period, offset: u64, limit: u64) -> Result<Vec<ViewRecord>>;
}

/// Feed held in process memory, kept sorted by `(displayed_at, id)`
#[derive(Default)]
pub struct InMemoryTransactionSource {
    records: RwLock<Vec<ViewRecord>>,
}

impl InMemoryTransactionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut records: Vec<ViewRecord>) -> Self {
        records.sort_by(Self::feed_order);
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn push(&self, record: ViewRecord) {
        let mut records = self.records.write().await;
        let at = records.partition_point(|r| Self::feed_order(r, &record).is_lt());
        records.insert(at, record);
    }

    pub async fn extend(&self, new_records: impl IntoIterator<Item = ViewRecord>) {
        let mut records = self.records.write().await;
        records.extend(new_records);
        records.sort_by(Self::feed_order);
    }

    fn feed_order(a: &ViewRecord, b: &ViewRecord) -> Ordering {
        (a.displayed_at, &a.id).cmp(&(b.displayed_at, &b.id))
    }

    fn period_range(records: &[ViewRecord], period: Period) -> Range<usize> {
        let (from, until) = (period.start(), period.end());
        let start = records.partition_point(|r| r.displayed_at < from);
        let end = records.partition_point(|r| r.displayed_at < until);
        start..end
    }
}

#[async_trait]
impl TransactionSource for InMemoryTransactionSource {
    async fn count(&self, period: Period) -> Result<i64> {
        let records = self.records.read().await;
        Ok(Self::period_range(&records, period).len() as i64)
    }

    async fn fetch_page(&self, period: Period, offset: u64, limit: u64) -> Result<Vec<ViewRecord>> {
        let records = self.records.read().await;
        let range = Self::period_range(&records, period);
        let from = range.start.saturating_add(offset as usize).min(range.end);
        let to = from.saturating_add(limit as usize).min(range.end);
        Ok(records[from..to].to_vec())
    }
}

/// Feed backed by the `view_records` table
pub struct MySqlTransactionSource {
    pool: MySqlPool,
}

impl MySqlTransactionSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionSource for MySqlTransactionSource {
    async fn count(&self, period: Period) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM view_records WHERE displayed_at >= ? AND displayed_at < ?",
        )
        .bind(period.start())
        .bind(period.end())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to count view records: {}", e)))?;

        Ok(count)
    }

    async fn fetch_page(&self, period: Period, offset: u64, limit: u64) -> Result<Vec<ViewRecord>> {
        let rows = sqlx::query_as::<_, ViewRecordRow>(
            r#"
            SELECT id, merchant_id, partner_id, advertisement_id, device_id, category,
                   amount, currency, displayed_at
            FROM view_records
            WHERE displayed_at >= ? AND displayed_at < ?
            ORDER BY displayed_at, id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(period.start())
        .bind(period.end())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch view records: {}", e)))?;

        rows.into_iter().map(ViewRecordRow::into_record).collect()
    }
}

#[derive(Debug, FromRow)]
struct ViewRecordRow {
    id: String,
    merchant_id: Option<String>,
    partner_id: Option<String>,
    advertisement_id: Option<String>,
    device_id: Option<String>,
    category: Option<String>,
    amount: Decimal,
    currency: String,
    displayed_at: DateTime<Utc>,
}

impl ViewRecordRow {
    fn into_record(self) -> Result<ViewRecord> {
        // An unknown currency code means the feed itself is corrupt
        let currency = self.currency.parse::<Currency>().map_err(|e| {
            AppError::run_fatal(format!("view record '{}' has {}", self.id, e))
        })?;

        Ok(ViewRecord {
            id: self.id,
            merchant_id: self.merchant_id,
            partner_id: self.partner_id,
            advertisement_id: self.advertisement_id,
            device_id: self.device_id,
            category: self.category,
            amount: self.amount,
            currency,
            displayed_at: self.displayed_at,
        })
    }
}
