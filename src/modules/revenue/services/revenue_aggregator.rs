use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;

use crate::core::{AppError, Currency, Result};
use crate::modules::allocations::models::AllocationResult;
use crate::modules::revenue::models::{AggregateKey, DimensionSpec, RevenueAggregate};

/// Rolls allocation results up into period aggregates
///
/// Output is sorted by key, so identical inputs always produce identical
/// output. Currencies are never mixed: every key includes the currency.
pub struct RevenueAggregator;

impl RevenueAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Group results by period, the requested dimension tuple and currency
    pub fn aggregate(&self, allocations: &[AllocationResult], spec: &DimensionSpec) -> Vec<RevenueAggregate> {
        let mut groups: BTreeMap<AggregateKey, (Decimal, HashSet<&str>)> = BTreeMap::new();

        for result in allocations {
            let entry = groups
                .entry(AggregateKey::for_result(spec, result))
                .or_insert_with(|| (Decimal::ZERO, HashSet::new()));
            entry.0 += result.amount_allocated;
            entry.1.insert(result.transaction_id.as_str());
        }

        groups
            .into_iter()
            .map(|(key, (total_amount, transactions))| RevenueAggregate {
                period: key.period,
                dimensions: key.dimensions,
                currency: key.currency,
                total_amount,
                record_count: transactions.len() as i64,
            })
            .collect()
    }

    /// Single-currency rollup; fails loudly instead of silently summing currencies
    ///
    /// # Errors
    /// * `CurrencyMismatch` - an input carries a currency other than `currency`
    pub fn aggregate_single_currency(
        &self,
        allocations: &[AllocationResult],
        spec: &DimensionSpec,
        currency: Currency,
    ) -> Result<Vec<RevenueAggregate>> {
        if let Some(other) = allocations.iter().find(|r| r.currency != currency) {
            return Err(AppError::CurrencyMismatch {
                expected: currency,
                found: other.currency,
            });
        }

        Ok(self.aggregate(allocations, spec))
    }

    /// Combine partial aggregates computed over disjoint transaction sets
    ///
    /// Summation is associative and commutative, so partials may be merged in
    /// any order or grouping.
    pub fn merge(&self, partials: impl IntoIterator<Item = RevenueAggregate>) -> Vec<RevenueAggregate> {
        let mut merged: BTreeMap<AggregateKey, RevenueAggregate> = BTreeMap::new();

        for aggregate in partials {
            match merged.get_mut(&aggregate.key()) {
                Some(existing) => {
                    existing.total_amount += aggregate.total_amount;
                    existing.record_count += aggregate.record_count;
                }
                None => {
                    merged.insert(aggregate.key(), aggregate);
                }
            }
        }

        merged.into_values().collect()
    }

    /// Per-currency sum of a set of aggregates
    pub fn totals_by_currency(&self, aggregates: &[RevenueAggregate]) -> BTreeMap<Currency, Decimal> {
        let mut totals = BTreeMap::new();
        for aggregate in aggregates {
            *totals.entry(aggregate.currency).or_insert(Decimal::ZERO) += aggregate.total_amount;
        }
        totals
    }
}

impl Default for RevenueAggregator {
    fn default() -> Self {
        Self::new()
    }
}
