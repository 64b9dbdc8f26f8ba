use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::core::{AppError, Period, Result};
use crate::modules::settlements::models::{BatchStatus, CurrencyTotal, RecordFailure, SettlementBatch};

/// Storage for settlement batches and their per-record failures
///
/// `update` writes the batch row only; failures are appended separately so a
/// progress save never rewrites the whole failure list.
#[async_trait]
pub trait SettlementBatchRepository: Send + Sync {
    /// Persist a new batch, assigning its id
    async fn create(&self, batch: SettlementBatch) -> Result<SettlementBatch>;

    /// Save status, counters and totals of an existing batch
    async fn update(&self, batch: &SettlementBatch) -> Result<()>;

    async fn append_failures(&self, batch_id: i64, failures: &[RecordFailure]) -> Result<()>;

    /// Batch with its failures loaded
    async fn find_by_id(&self, id: i64) -> Result<Option<SettlementBatch>>;

    /// Every batch of a period, oldest attempt first (failures not loaded)
    async fn list_for_period(&self, period: Period) -> Result<Vec<SettlementBatch>>;

    /// Most recent completed batch of a period
    async fn latest_completed(&self, period: Period) -> Result<Option<SettlementBatch>>;

    /// Batches still pending or running, across all periods
    async fn list_in_progress(&self) -> Result<Vec<SettlementBatch>>;
}

#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    batches: BTreeMap<i64, SettlementBatch>,
}

#[derive(Default)]
pub struct InMemoryBatchRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementBatchRepository for InMemoryBatchRepository {
    async fn create(&self, mut batch: SettlementBatch) -> Result<SettlementBatch> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        batch.id = state.next_id;
        batch.failures.clear();
        state.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn update(&self, batch: &SettlementBatch) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .batches
            .get_mut(&batch.id)
            .ok_or_else(|| AppError::not_found(format!("Settlement batch {}", batch.id)))?;

        let failures = std::mem::take(&mut stored.failures);
        *stored = SettlementBatch {
            failures,
            ..batch.clone()
        };
        Ok(())
    }

    async fn append_failures(&self, batch_id: i64, failures: &[RecordFailure]) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| AppError::not_found(format!("Settlement batch {}", batch_id)))?;
        stored.failures.extend_from_slice(failures);
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SettlementBatch>> {
        Ok(self.state.read().await.batches.get(&id).cloned())
    }

    async fn list_for_period(&self, period: Period) -> Result<Vec<SettlementBatch>> {
        let state = self.state.read().await;
        let mut batches: Vec<SettlementBatch> = state
            .batches
            .values()
            .filter(|b| b.period == period)
            .map(|b| SettlementBatch {
                failures: Vec::new(),
                ..b.clone()
            })
            .collect();
        batches.sort_by_key(|b| (b.attempt, b.id));
        Ok(batches)
    }

    async fn latest_completed(&self, period: Period) -> Result<Option<SettlementBatch>> {
        let state = self.state.read().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.period == period && b.status == BatchStatus::Completed)
            .max_by_key(|b| (b.attempt, b.id))
            .cloned())
    }

    async fn list_in_progress(&self) -> Result<Vec<SettlementBatch>> {
        let state = self.state.read().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.is_in_progress())
            .cloned()
            .collect())
    }
}

pub struct MySqlBatchRepository {
    pool: MySqlPool,
}

impl MySqlBatchRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load_failures(&self, batch_id: i64) -> Result<Vec<RecordFailure>> {
        let rows = sqlx::query_as::<_, FailureRow>(
            r#"
            SELECT record_id, reason
            FROM settlement_record_failures
            WHERE batch_id = ?
            ORDER BY id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch record failures: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| RecordFailure {
                record_id: row.record_id,
                reason: row.reason,
            })
            .collect())
    }
}

const BATCH_COLUMNS: &str = r#"
    id, period_year, period_month, attempt, force_regenerated, status,
    total_records, processed_records, failed_records, gross_totals, error,
    tolerance_exceeded, created_at, started_at, completed_at
"#;

#[async_trait]
impl SettlementBatchRepository for MySqlBatchRepository {
    async fn create(&self, mut batch: SettlementBatch) -> Result<SettlementBatch> {
        let gross_totals = serde_json::to_string(&batch.gross_totals)?;

        let result = sqlx::query(
            r#"
            INSERT INTO settlement_batches (
                period_year, period_month, attempt, force_regenerated, status,
                total_records, processed_records, failed_records, gross_totals, error,
                tolerance_exceeded, created_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch.period.year())
        .bind(batch.period.month())
        .bind(batch.attempt)
        .bind(batch.force_regenerated)
        .bind(batch.status.to_string())
        .bind(batch.total_records)
        .bind(batch.processed_records)
        .bind(batch.failed_records)
        .bind(gross_totals)
        .bind(&batch.error)
        .bind(batch.tolerance_exceeded)
        .bind(batch.created_at)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("Duplicate entry") {
                AppError::conflict(format!(
                    "Attempt {} of period {} already exists",
                    batch.attempt, batch.period
                ))
            } else {
                AppError::Internal(format!("Failed to create settlement batch: {}", e))
            }
        })?;

        batch.id = result.last_insert_id() as i64;
        batch.failures.clear();
        Ok(batch)
    }

    async fn update(&self, batch: &SettlementBatch) -> Result<()> {
        let gross_totals = serde_json::to_string(&batch.gross_totals)?;

        let result = sqlx::query(
            r#"
            UPDATE settlement_batches
            SET status = ?, total_records = ?, processed_records = ?, failed_records = ?,
                gross_totals = ?, error = ?, tolerance_exceeded = ?, started_at = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(batch.status.to_string())
        .bind(batch.total_records)
        .bind(batch.processed_records)
        .bind(batch.failed_records)
        .bind(gross_totals)
        .bind(&batch.error)
        .bind(batch.tolerance_exceeded)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .bind(batch.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update settlement batch: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Settlement batch {}", batch.id)));
        }

        Ok(())
    }

    async fn append_failures(&self, batch_id: i64, failures: &[RecordFailure]) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        for failure in failures {
            sqlx::query(
                "INSERT INTO settlement_record_failures (batch_id, record_id, reason) VALUES (?, ?, ?)",
            )
            .bind(batch_id)
            .bind(&failure.record_id)
            .bind(&failure.reason)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store record failure: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<SettlementBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM settlement_batches WHERE id = ?",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch settlement batch: {}", e)))?;

        match row {
            Some(row) => {
                let mut batch = row.into_batch()?;
                batch.failures = self.load_failures(batch.id).await?;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    async fn list_for_period(&self, period: Period) -> Result<Vec<SettlementBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM settlement_batches WHERE period_year = ? AND period_month = ? ORDER BY attempt, id",
            BATCH_COLUMNS
        ))
        .bind(period.year())
        .bind(period.month())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list settlement batches: {}", e)))?;

        rows.into_iter().map(BatchRow::into_batch).collect()
    }

    async fn latest_completed(&self, period: Period) -> Result<Option<SettlementBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {} FROM settlement_batches
            WHERE period_year = ? AND period_month = ? AND status = 'completed'
            ORDER BY attempt DESC, id DESC
            LIMIT 1
            "#,
            BATCH_COLUMNS
        ))
        .bind(period.year())
        .bind(period.month())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch settlement batch: {}", e)))?;

        match row {
            Some(row) => {
                let mut batch = row.into_batch()?;
                batch.failures = self.load_failures(batch.id).await?;
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }

    async fn list_in_progress(&self) -> Result<Vec<SettlementBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM settlement_batches WHERE status IN ('pending', 'running') ORDER BY id",
            BATCH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list settlement batches: {}", e)))?;

        rows.into_iter().map(BatchRow::into_batch).collect()
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: i64,
    period_year: i32,
    period_month: u32,
    attempt: i32,
    force_regenerated: bool,
    status: String,
    total_records: i64,
    processed_records: i64,
    failed_records: i64,
    gross_totals: String,
    error: Option<String>,
    tolerance_exceeded: bool,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl BatchRow {
    fn into_batch(self) -> Result<SettlementBatch> {
        let gross_totals: Vec<CurrencyTotal> = serde_json::from_str(&self.gross_totals)?;
        Ok(SettlementBatch {
            id: self.id,
            period: Period::new(self.period_year, self.period_month).map_err(AppError::Internal)?,
            attempt: self.attempt,
            force_regenerated: self.force_regenerated,
            status: self.status.parse::<BatchStatus>().map_err(AppError::Internal)?,
            total_records: self.total_records,
            processed_records: self.processed_records,
            failed_records: self.failed_records,
            gross_totals,
            failures: Vec::new(),
            error: self.error,
            tolerance_exceeded: self.tolerance_exceeded,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FailureRow {
    record_id: String,
    reason: String,
}
