use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Currency, Result};
use crate::modules::allocations::models::Beneficiary;
use crate::modules::reports::models::{
    CategoryBreakdown, EntityBreakdown, MerchantSummary, SettlementReport,
};
use crate::modules::revenue::models::{Dimension, DimensionSpec, RevenueAggregate};
use crate::modules::settlements::models::{BatchStatus, CurrencyTotal, SettlementBatch};

/// Builds settlement reports from a batch and its stored aggregates
///
/// Pure read path. Only completed batches are reportable, and the report
/// totals must agree with the batch's gross totals for every currency.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    /// * `Conflict` - the batch is not completed
    /// * `Internal` - aggregates disagree with the batch totals
    pub fn build_report(
        &self,
        batch: &SettlementBatch,
        aggregates: &[RevenueAggregate],
    ) -> Result<SettlementReport> {
        if batch.status != BatchStatus::Completed {
            return Err(AppError::conflict(format!(
                "Settlement batch {} is {}; only completed batches can be reported",
                batch.id,
                batch.display_status()
            )));
        }

        let totals = Self::sum_by_currency(Self::slice(aggregates, &DimensionSpec::total()));
        Self::ensure_matches(batch, "batch gross", &Self::batch_totals(batch), &totals)?;

        let entity_rows = Self::slice(aggregates, &DimensionSpec::new([Dimension::Entity]));
        Self::ensure_matches(
            batch,
            "entity breakdown",
            &totals,
            &Self::sum_by_currency(entity_rows.iter().copied()),
        )?;

        let entities = entity_rows
            .iter()
            .map(|a| EntityBreakdown {
                entity: a.value_of(Dimension::Entity).unwrap_or_default().to_string(),
                currency: a.currency,
                amount: a.total_amount,
                record_count: a.record_count,
            })
            .collect();

        let merchants = Self::merchant_summaries(aggregates);
        let categories = Self::category_breakdown(aggregates, &totals);

        Ok(SettlementReport {
            batch_id: batch.id,
            period: batch.period,
            status: batch.display_status().to_string(),
            is_partial: batch.has_failures(),
            processed_records: batch.processed_records,
            failed_records: batch.failed_records,
            totals: totals
                .into_iter()
                .map(|(currency, amount)| CurrencyTotal { currency, amount })
                .collect(),
            entities,
            merchants,
            categories,
            generated_at: Utc::now(),
        })
    }

    fn merchant_summaries(aggregates: &[RevenueAggregate]) -> Vec<MerchantSummary> {
        let mut fees: BTreeMap<(String, Currency), Decimal> = BTreeMap::new();
        for aggregate in Self::slice(aggregates, &DimensionSpec::new([Dimension::Merchant, Dimension::Entity])) {
            let is_fee = aggregate
                .value_of(Dimension::Entity)
                .and_then(|label| label.parse::<Beneficiary>().ok())
                .is_some_and(|b| b.is_fee());
            if is_fee {
                let merchant = aggregate.value_of(Dimension::Merchant).unwrap_or_default();
                *fees
                    .entry((merchant.to_string(), aggregate.currency))
                    .or_insert(Decimal::ZERO) += aggregate.total_amount;
            }
        }

        Self::slice(aggregates, &DimensionSpec::new([Dimension::Merchant]))
            .into_iter()
            .map(|a| {
                let merchant_id = a.value_of(Dimension::Merchant).unwrap_or_default().to_string();
                let fee_total = fees
                    .get(&(merchant_id.clone(), a.currency))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                MerchantSummary {
                    merchant_id,
                    currency: a.currency,
                    gross: a.total_amount,
                    fees: fee_total,
                    net: a.total_amount - fee_total,
                    record_count: a.record_count,
                }
            })
            .collect()
    }

    fn category_breakdown(
        aggregates: &[RevenueAggregate],
        totals: &BTreeMap<Currency, Decimal>,
    ) -> Vec<CategoryBreakdown> {
        Self::slice(aggregates, &DimensionSpec::new([Dimension::Category]))
            .into_iter()
            .map(|a| {
                let total = totals.get(&a.currency).copied().unwrap_or(Decimal::ZERO);
                let percentage = if total.is_zero() {
                    Decimal::ZERO
                } else {
                    (a.total_amount * Decimal::ONE_HUNDRED / total)
                        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
                };
                CategoryBreakdown {
                    category: a.value_of(Dimension::Category).unwrap_or_default().to_string(),
                    currency: a.currency,
                    amount: a.total_amount,
                    percentage,
                    record_count: a.record_count,
                }
            })
            .collect()
    }

    fn slice<'a>(aggregates: &'a [RevenueAggregate], spec: &DimensionSpec) -> Vec<&'a RevenueAggregate> {
        aggregates.iter().filter(|a| spec.matches(a)).collect()
    }

    fn sum_by_currency<'a>(
        aggregates: impl IntoIterator<Item = &'a RevenueAggregate>,
    ) -> BTreeMap<Currency, Decimal> {
        let mut totals = BTreeMap::new();
        for aggregate in aggregates {
            *totals.entry(aggregate.currency).or_insert(Decimal::ZERO) += aggregate.total_amount;
        }
        totals
    }

    fn batch_totals(batch: &SettlementBatch) -> BTreeMap<Currency, Decimal> {
        batch
            .gross_totals
            .iter()
            .map(|t| (t.currency, t.amount))
            .collect()
    }

    // Missing currencies count as zero on either side
    fn ensure_matches(
        batch: &SettlementBatch,
        what: &str,
        expected: &BTreeMap<Currency, Decimal>,
        actual: &BTreeMap<Currency, Decimal>,
    ) -> Result<()> {
        for currency in expected.keys().chain(actual.keys()) {
            let want = expected.get(currency).copied().unwrap_or(Decimal::ZERO);
            let got = actual.get(currency).copied().unwrap_or(Decimal::ZERO);
            if want != got {
                return Err(AppError::internal(format!(
                    "Settlement batch {}: {} total for {} is {}, expected {}",
                    batch.id, what, currency, got, want
                )));
            }
        }
        Ok(())
    }
}
