use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::{AppError, Currency, Period, Result};
use crate::modules::revenue::models::{DimensionValue, RevenueAggregate};

/// Storage for aggregates produced by settlement runs, keyed by batch
///
/// Aggregates of different runs never overwrite each other, so every
/// historical batch stays reportable.
#[async_trait]
pub trait RevenueAggregateRepository: Send + Sync {
    /// Replace every aggregate stored for a batch
    async fn replace_for_batch(&self, batch_id: i64, aggregates: &[RevenueAggregate]) -> Result<()>;

    async fn list_for_batch(&self, batch_id: i64) -> Result<Vec<RevenueAggregate>>;

    /// Drop a batch's aggregates (used when a run aborts)
    async fn delete_for_batch(&self, batch_id: i64) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryAggregateRepository {
    by_batch: RwLock<HashMap<i64, Vec<RevenueAggregate>>>,
}

impl InMemoryAggregateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevenueAggregateRepository for InMemoryAggregateRepository {
    async fn replace_for_batch(&self, batch_id: i64, aggregates: &[RevenueAggregate]) -> Result<()> {
        self.by_batch
            .write()
            .await
            .insert(batch_id, aggregates.to_vec());
        Ok(())
    }

    async fn list_for_batch(&self, batch_id: i64) -> Result<Vec<RevenueAggregate>> {
        Ok(self
            .by_batch
            .read()
            .await
            .get(&batch_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_for_batch(&self, batch_id: i64) -> Result<()> {
        self.by_batch.write().await.remove(&batch_id);
        Ok(())
    }
}

pub struct MySqlAggregateRepository {
    pool: MySqlPool,
}

impl MySqlAggregateRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevenueAggregateRepository for MySqlAggregateRepository {
    async fn replace_for_batch(&self, batch_id: i64, aggregates: &[RevenueAggregate]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        sqlx::query("DELETE FROM revenue_aggregates WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to clear aggregates: {}", e)))?;

        for aggregate in aggregates {
            let dimensions = serde_json::to_string(&aggregate.dimensions)?;
            sqlx::query(
                r#"
                INSERT INTO revenue_aggregates (
                    batch_id, period_year, period_month, dimensions, currency,
                    total_amount, record_count
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(batch_id)
            .bind(aggregate.period.year())
            .bind(aggregate.period.month())
            .bind(dimensions)
            .bind(aggregate.currency.to_string())
            .bind(aggregate.total_amount)
            .bind(aggregate.record_count)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store aggregate: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn list_for_batch(&self, batch_id: i64) -> Result<Vec<RevenueAggregate>> {
        let rows = sqlx::query_as::<_, AggregateRow>(
            r#"
            SELECT period_year, period_month, dimensions, currency, total_amount, record_count
            FROM revenue_aggregates
            WHERE batch_id = ?
            ORDER BY id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch aggregates: {}", e)))?;

        rows.into_iter().map(AggregateRow::into_aggregate).collect()
    }

    async fn delete_for_batch(&self, batch_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM revenue_aggregates WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete aggregates: {}", e)))?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct AggregateRow {
    period_year: i32,
    period_month: u32,
    dimensions: String,
    currency: String,
    total_amount: Decimal,
    record_count: i64,
}

impl AggregateRow {
    fn into_aggregate(self) -> Result<RevenueAggregate> {
        let dimensions: Vec<DimensionValue> = serde_json::from_str(&self.dimensions)?;
        Ok(RevenueAggregate {
            period: Period::new(self.period_year, self.period_month).map_err(AppError::Internal)?,
            dimensions,
            currency: self.currency.parse::<Currency>().map_err(AppError::Internal)?,
            total_amount: self.total_amount,
            record_count: self.record_count,
        })
    }
}
