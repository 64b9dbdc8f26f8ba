// Settlement batch model
//
// A batch is one generation run for one period. Lifecycle:
//   pending -> running -> completed | failed
// Terminal batches are never reopened; regeneration creates a new batch.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Currency, Period, Result};

/// Settlement batch lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    #[serde(rename = "pending")]
    Pending,

    #[serde(rename = "running")]
    Running,

    #[serde(rename = "completed")]
    Completed,

    #[serde(rename = "failed")]
    Failed,
}

impl Default for BatchStatus {
    fn default() -> Self {
        BatchStatus::Pending
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Running => write!(f, "running"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "running" => Ok(BatchStatus::Running),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            _ => Err(format!("Invalid batch status: {}", s)),
        }
    }
}

/// Per-record failure kept for operator remediation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub record_id: String,
    pub reason: String,
}

/// Gross amount of processed records in one currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotal {
    pub currency: Currency,
    pub amount: Decimal,
}

/// One settlement generation run for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementBatch {
    /// Store-assigned id; 0 until persisted
    pub id: i64,
    pub period: Period,
    /// 1-based run number within the period
    pub attempt: i32,
    pub force_regenerated: bool,
    pub status: BatchStatus,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    pub gross_totals: Vec<CurrencyTotal>,
    pub failures: Vec<RecordFailure>,
    pub error: Option<String>,
    /// Set when every record was read but too many of them failed
    #[serde(default)]
    pub tolerance_exceeded: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Live progress of a batch, read from its real counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub batch_id: i64,
    pub period: Period,
    pub status: BatchStatus,
    pub display_status: &'static str,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    /// Share of records handled so far, 0-100 with 2 decimals
    pub percent_complete: Decimal,
}

impl SettlementBatch {
    pub fn new(period: Period, attempt: i32, force_regenerated: bool) -> Self {
        Self {
            id: 0,
            period,
            attempt,
            force_regenerated,
            status: BatchStatus::Pending,
            total_records: 0,
            processed_records: 0,
            failed_records: 0,
            gross_totals: Vec::new(),
            failures: Vec::new(),
            error: None,
            tolerance_exceeded: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// pending -> running
    pub fn start(&mut self, total_records: i64) -> Result<()> {
        if self.status != BatchStatus::Pending {
            return Err(self.invalid_transition(BatchStatus::Running));
        }
        self.status = BatchStatus::Running;
        self.total_records = total_records;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn record_success(&mut self, currency: Currency, gross_amount: Decimal) -> Result<()> {
        self.ensure_running()?;
        self.processed_records += 1;
        match self.gross_totals.iter_mut().find(|t| t.currency == currency) {
            Some(total) => total.amount += gross_amount,
            None => {
                self.gross_totals.push(CurrencyTotal {
                    currency,
                    amount: gross_amount,
                });
                self.gross_totals.sort_by_key(|t| t.currency);
            }
        }
        Ok(())
    }

    pub fn record_failure(&mut self, record_id: impl Into<String>, reason: impl Into<String>) -> Result<RecordFailure> {
        self.ensure_running()?;
        self.failed_records += 1;
        let failure = RecordFailure {
            record_id: record_id.into(),
            reason: reason.into(),
        };
        self.failures.push(failure.clone());
        Ok(failure)
    }

    /// running -> completed, or running -> failed when too many records failed
    ///
    /// `max_failure_ratio` is the share of failed records (0..=1) a batch may
    /// carry and still complete. A completion with failures stays qualified:
    /// see [`SettlementBatch::display_status`].
    pub fn finish(&mut self, max_failure_ratio: Decimal) -> Result<()> {
        self.ensure_running()?;

        let handled = self.processed_records + self.failed_records;
        if handled != self.total_records {
            return Err(AppError::run_fatal(format!(
                "transaction feed changed during run: expected {} records, read {}",
                self.total_records, handled
            )));
        }

        let now = Utc::now();
        self.completed_at = Some(now);

        if self.failure_ratio() > max_failure_ratio {
            self.status = BatchStatus::Failed;
            self.tolerance_exceeded = true;
            self.error = Some(format!(
                "{} of {} records failed (tolerance {}%)",
                self.failed_records,
                self.total_records,
                (max_failure_ratio * Decimal::ONE_HUNDRED).normalize()
            ));
        } else {
            self.status = BatchStatus::Completed;
        }

        Ok(())
    }

    /// Abort the run. Nothing this run produced is authoritative afterwards.
    pub fn abort(&mut self, error: impl Into<String>) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid_transition(BatchStatus::Failed));
        }
        self.status = BatchStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    pub fn has_failures(&self) -> bool {
        self.failed_records > 0
    }

    /// Failed records over total, 0 for empty batches
    pub fn failure_ratio(&self) -> Decimal {
        if self.total_records == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.failed_records) / Decimal::from(self.total_records)
    }

    /// Status as shown to operators; a completion with failures is never shown as plain "completed"
    pub fn display_status(&self) -> &'static str {
        match self.status {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed if self.has_failures() => "completed_with_errors",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed if self.tolerance_exceeded => "failed_partial",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn gross_total(&self, currency: Currency) -> Decimal {
        self.gross_totals
            .iter()
            .filter(|t| t.currency == currency)
            .map(|t| t.amount)
            .sum()
    }

    pub fn progress(&self) -> BatchProgress {
        let handled = self.processed_records + self.failed_records;
        let percent_complete = if self.total_records > 0 {
            (Decimal::from(handled) * Decimal::ONE_HUNDRED / Decimal::from(self.total_records))
                .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        } else if self.is_terminal() {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        BatchProgress {
            batch_id: self.id,
            period: self.period,
            status: self.status,
            display_status: self.display_status(),
            total_records: self.total_records,
            processed_records: self.processed_records,
            failed_records: self.failed_records,
            percent_complete,
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.status != BatchStatus::Running {
            return Err(AppError::conflict(format!(
                "Batch {} is {}, not running",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn invalid_transition(&self, to: BatchStatus) -> AppError {
        AppError::conflict(format!(
            "Invalid batch status transition from {} to {}",
            self.status, to
        ))
    }
}
