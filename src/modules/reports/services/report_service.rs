use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{AppError, Period, Result};
use crate::modules::reports::models::SettlementReport;
use crate::modules::reports::services::ReportBuilder;
use crate::modules::revenue::repositories::RevenueAggregateRepository;
use crate::modules::settlements::repositories::SettlementBatchRepository;

/// Service for reading settlement reports
pub struct ReportService {
    batch_repo: Arc<dyn SettlementBatchRepository>,
    aggregate_repo: Arc<dyn RevenueAggregateRepository>,
    builder: ReportBuilder,
}

impl ReportService {
    pub fn new(
        batch_repo: Arc<dyn SettlementBatchRepository>,
        aggregate_repo: Arc<dyn RevenueAggregateRepository>,
    ) -> Self {
        Self {
            batch_repo,
            aggregate_repo,
            builder: ReportBuilder::new(),
        }
    }

    /// Report of one batch
    ///
    /// # Errors
    /// * `NotFound` - unknown batch
    /// * `Conflict` - the batch is not completed
    pub async fn report_for_batch(&self, batch_id: i64) -> Result<SettlementReport> {
        let batch = self
            .batch_repo
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Settlement batch {}", batch_id)))?;

        let aggregates = self.aggregate_repo.list_for_batch(batch.id).await?;
        let report = self.builder.build_report(&batch, &aggregates)?;

        if report.is_partial {
            warn!(
                batch_id = batch.id,
                failed_records = batch.failed_records,
                "Settlement report built from a partial batch"
            );
        }

        info!(
            batch_id = batch.id,
            period = %batch.period,
            entities = report.entities.len(),
            merchants = report.merchants.len(),
            "Settlement report generated"
        );

        Ok(report)
    }

    /// Report of the current (latest completed) batch of a period
    pub async fn latest_report(&self, period: Period) -> Result<SettlementReport> {
        let batch = self
            .batch_repo
            .latest_completed(period)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Completed settlement for {}", period)))?;

        self.report_for_batch(batch.id).await
    }
}
