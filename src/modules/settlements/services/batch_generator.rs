// Settlement batch generation
//
// A run reads the period's view records page by page, allocates each record
// against the fee schema snapshot taken at the end of the period, and folds
// the shares into running aggregates. Aggregates are merged page by page, so
// memory is bounded by the number of aggregate keys, not by record count.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::config::SettlementConfig;
use crate::core::{AppError, Period, Result};
use crate::modules::allocations::models::{TransactionAllocation, ViewRecord};
use crate::modules::allocations::services::AllocationCalculator;
use crate::modules::fee_schemas::models::SchemaSnapshot;
use crate::modules::fee_schemas::repositories::FeeSchemaRepository;
use crate::modules::revenue::models::{Dimension, DimensionSpec, RevenueAggregate};
use crate::modules::revenue::repositories::RevenueAggregateRepository;
use crate::modules::revenue::services::RevenueAggregator;
use crate::modules::settlements::models::{BatchProgress, RecordFailure, SettlementBatch};
use crate::modules::settlements::repositories::{SettlementBatchRepository, TransactionSource};

/// Dimension tuples every settlement run materializes
pub fn settlement_dimensions() -> Vec<DimensionSpec> {
    vec![
        DimensionSpec::total(),
        DimensionSpec::new([Dimension::Entity]),
        DimensionSpec::new([Dimension::Merchant]),
        DimensionSpec::new([Dimension::Merchant, Dimension::Entity]),
        DimensionSpec::new([Dimension::Category]),
        DimensionSpec::new([Dimension::Partner]),
        DimensionSpec::new([Dimension::Device]),
    ]
}

type Registry = Arc<StdMutex<HashSet<Period>>>;

/// Exclusive right to run a period inside this process; released on drop
#[derive(Debug)]
pub struct PeriodLease {
    period: Period,
    registry: Registry,
}

impl PeriodLease {
    fn acquire(registry: &Registry, period: Period) -> Result<Self> {
        let mut in_flight = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(period) {
            return Err(AppError::conflict(format!(
                "Settlement generation for {} is already in progress",
                period
            )));
        }
        Ok(Self {
            period,
            registry: Arc::clone(registry),
        })
    }

    pub fn period(&self) -> Period {
        self.period
    }
}

impl Drop for PeriodLease {
    fn drop(&mut self) {
        let mut in_flight = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.period);
    }
}

/// A created batch together with the lease allowing it to run
#[derive(Debug)]
pub struct PendingRun {
    batch: SettlementBatch,
    lease: PeriodLease,
}

impl PendingRun {
    pub fn batch(&self) -> &SettlementBatch {
        &self.batch
    }
}

/// Result of asking for a period's settlement
#[derive(Debug)]
pub enum GenerationStart {
    /// The period already has a completed batch and no regeneration was forced
    Existing(SettlementBatch),
    /// A new batch was created and must be run
    Started(PendingRun),
}

/// Result of a request handled in the background
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Existing(SettlementBatch),
    Scheduled(SettlementBatch),
}

pub struct SettlementBatchGenerator {
    schema_repo: Arc<dyn FeeSchemaRepository>,
    source: Arc<dyn TransactionSource>,
    batch_repo: Arc<dyn SettlementBatchRepository>,
    aggregate_repo: Arc<dyn RevenueAggregateRepository>,
    calculator: AllocationCalculator,
    aggregator: RevenueAggregator,
    config: SettlementConfig,
    in_flight: Registry,
    // Batches whose run ended here but whose outcome never reached the store
    stranded: StdMutex<HashSet<i64>>,
}

impl SettlementBatchGenerator {
    pub fn new(
        schema_repo: Arc<dyn FeeSchemaRepository>,
        source: Arc<dyn TransactionSource>,
        batch_repo: Arc<dyn SettlementBatchRepository>,
        aggregate_repo: Arc<dyn RevenueAggregateRepository>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            schema_repo,
            source,
            batch_repo,
            aggregate_repo,
            calculator: AllocationCalculator::new(
                config.remainder_policy,
                config.reconciliation_entity,
            ),
            aggregator: RevenueAggregator::new(),
            config,
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
            stranded: StdMutex::new(HashSet::new()),
        }
    }

    /// Return the current batch of a period or create a new pending one
    ///
    /// # Errors
    /// * `Conflict` - a run for the period is in flight, here or in a persisted batch
    pub async fn start(&self, period: Period, force_regenerate: bool) -> Result<GenerationStart> {
        let lease = PeriodLease::acquire(&self.in_flight, period)?;

        let mut history = self.batch_repo.list_for_period(period).await?;
        self.release_stranded(&mut history).await?;
        if let Some(active) = history.iter().find(|b| b.is_in_progress()) {
            return Err(AppError::conflict(format!(
                "Settlement batch {} for {} is still {}",
                active.id, period, active.status
            )));
        }

        if !force_regenerate {
            if let Some(existing) = self.batch_repo.latest_completed(period).await? {
                debug!(period = %period, batch_id = existing.id, "Returning existing settlement batch");
                return Ok(GenerationStart::Existing(existing));
            }
        }

        let attempt = history.iter().map(|b| b.attempt).max().unwrap_or(0) + 1;
        let batch = self
            .batch_repo
            .create(SettlementBatch::new(period, attempt, force_regenerate))
            .await?;

        info!(
            period = %period,
            batch_id = batch.id,
            attempt = attempt,
            force_regenerate = force_regenerate,
            "Settlement batch created"
        );

        Ok(GenerationStart::Started(PendingRun { batch, lease }))
    }

    /// Execute a pending run to a terminal state
    ///
    /// Run-level errors are recorded on the returned batch, not returned.
    /// An `Err` means the batch itself could not be saved; the next start for
    /// the period marks it failed.
    pub async fn run(&self, pending: PendingRun) -> Result<SettlementBatch> {
        let PendingRun { mut batch, lease } = pending;

        if let Err(e) = self.execute(&mut batch).await {
            error!(
                period = %lease.period(),
                batch_id = batch.id,
                error = %e,
                "Settlement run aborted"
            );

            if let Err(cleanup) = self.aggregate_repo.delete_for_batch(batch.id).await {
                warn!(batch_id = batch.id, error = %cleanup, "Failed to discard aggregates of aborted run");
            }
            batch.abort(e.to_string())?;
        }

        if let Err(e) = self.batch_repo.update(&batch).await {
            error!(
                period = %batch.period,
                batch_id = batch.id,
                error = %e,
                "Failed to save settlement run outcome"
            );
            self.lock_stranded().insert(batch.id);
            return Err(e);
        }

        info!(
            period = %batch.period,
            batch_id = batch.id,
            status = batch.display_status(),
            total_records = batch.total_records,
            processed_records = batch.processed_records,
            failed_records = batch.failed_records,
            "Settlement run finished"
        );

        drop(lease);
        Ok(batch)
    }

    /// Start and run to completion on the calling task
    pub async fn generate(&self, period: Period, force_regenerate: bool) -> Result<SettlementBatch> {
        match self.start(period, force_regenerate).await? {
            GenerationStart::Existing(batch) => Ok(batch),
            GenerationStart::Started(pending) => self.run(pending).await,
        }
    }

    /// Start a run and drive it on a background tokio task
    pub async fn spawn_generation(
        self: &Arc<Self>,
        period: Period,
        force_regenerate: bool,
    ) -> Result<GenerationOutcome> {
        match self.start(period, force_regenerate).await? {
            GenerationStart::Existing(batch) => Ok(GenerationOutcome::Existing(batch)),
            GenerationStart::Started(pending) => {
                let batch = pending.batch().clone();
                let generator = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = generator.run(pending).await {
                        error!(period = %period, error = %e, "Failed to persist settlement run");
                    }
                });
                Ok(GenerationOutcome::Scheduled(batch))
            }
        }
    }

    /// Fail batches left pending or running by a previous process
    ///
    /// Call once at startup, before serving requests.
    pub async fn recover_abandoned(&self) -> Result<usize> {
        let mut recovered = 0;
        for mut batch in self.batch_repo.list_in_progress().await? {
            let leased = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .contains(&batch.period);
            if leased {
                continue;
            }

            batch.abort("run interrupted before completion")?;
            self.aggregate_repo.delete_for_batch(batch.id).await?;
            self.batch_repo.update(&batch).await?;
            self.lock_stranded().remove(&batch.id);
            warn!(period = %batch.period, batch_id = batch.id, "Abandoned settlement batch marked failed");
            recovered += 1;
        }
        Ok(recovered)
    }

    pub async fn get_batch(&self, batch_id: i64) -> Result<SettlementBatch> {
        self.batch_repo
            .find_by_id(batch_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Settlement batch {}", batch_id)))
    }

    pub async fn list_batches(&self, period: Period) -> Result<Vec<SettlementBatch>> {
        self.batch_repo.list_for_period(period).await
    }

    pub async fn progress(&self, batch_id: i64) -> Result<BatchProgress> {
        Ok(self.get_batch(batch_id).await?.progress())
    }

    // Called with the period lease held, so none of these batches can still be running
    async fn release_stranded(&self, history: &mut [SettlementBatch]) -> Result<()> {
        for batch in history.iter_mut() {
            if !batch.is_in_progress() || !self.lock_stranded().contains(&batch.id) {
                continue;
            }

            batch.abort("run outcome could not be saved; results discarded")?;
            self.aggregate_repo.delete_for_batch(batch.id).await?;
            self.batch_repo.update(batch).await?;
            self.lock_stranded().remove(&batch.id);
            warn!(period = %batch.period, batch_id = batch.id, "Stranded settlement batch marked failed");
        }
        Ok(())
    }

    fn lock_stranded(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.stranded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn execute(&self, batch: &mut SettlementBatch) -> Result<()> {
        let period = batch.period;

        let snapshot = self
            .schema_repo
            .snapshot_before(period.end())
            .await
            .map_err(|e| AppError::run_fatal(format!("fee schema snapshot unavailable: {}", e)))?;

        let total = self
            .source
            .count(period)
            .await
            .map_err(|e| AppError::run_fatal(format!("transaction source unavailable: {}", e)))?;

        batch.start(total)?;
        self.save_progress(batch, &[]).await?;

        info!(
            period = %period,
            batch_id = batch.id,
            total_records = total,
            schemas = snapshot.schemas.len(),
            "Settlement run started"
        );

        let specs = settlement_dimensions();
        let mut aggregates: Vec<RevenueAggregate> = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let page = self
                .source
                .fetch_page(period, offset, self.config.page_size)
                .await
                .map_err(|e| {
                    AppError::run_fatal(format!("failed to read records at offset {}: {}", offset, e))
                })?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;

            let mut allocations = Vec::new();
            let mut failures = Vec::new();
            for record in &page {
                match self.allocate(record, period, &snapshot) {
                    Ok(allocation) => {
                        batch.record_success(allocation.currency, allocation.gross_amount)?;
                        allocations.extend(allocation.shares);
                    }
                    Err(e) if e.is_record_level() => {
                        warn!(batch_id = batch.id, record_id = %record.id, error = %e, "Record skipped");
                        failures.push(batch.record_failure(&record.id, e.to_string())?);
                    }
                    Err(e) => return Err(e),
                }
            }

            let page_aggregates = specs
                .iter()
                .flat_map(|spec| self.aggregator.aggregate(&allocations, spec));
            aggregates = self
                .aggregator
                .merge(aggregates.into_iter().chain(page_aggregates));

            self.save_progress(batch, &failures).await?;

            debug!(
                batch_id = batch.id,
                processed_records = batch.processed_records,
                failed_records = batch.failed_records,
                total_records = batch.total_records,
                "Settlement page processed"
            );

            if (page.len() as u64) < self.config.page_size {
                break;
            }
        }

        self.aggregate_repo
            .replace_for_batch(batch.id, &aggregates)
            .await
            .map_err(|e| AppError::run_fatal(format!("failed to store aggregates: {}", e)))?;

        // A feed that changed mid-run aborts here and the stored aggregates are discarded
        batch.finish(self.config.max_failure_ratio)
    }

    fn allocate(
        &self,
        record: &ViewRecord,
        period: Period,
        snapshot: &SchemaSnapshot,
    ) -> Result<TransactionAllocation> {
        if !period.contains(record.displayed_at) {
            return Err(AppError::record(
                &record.id,
                format!("displayed at {} outside period {}", record.displayed_at, period),
            ));
        }
        self.calculator.allocate(record, &snapshot.schemas)
    }

    async fn save_progress(&self, batch: &SettlementBatch, failures: &[RecordFailure]) -> Result<()> {
        self.batch_repo
            .append_failures(batch.id, failures)
            .await
            .map_err(|e| AppError::run_fatal(format!("failed to record failures: {}", e)))?;
        self.batch_repo
            .update(batch)
            .await
            .map_err(|e| AppError::run_fatal(format!("failed to save progress: {}", e)))
    }
}
