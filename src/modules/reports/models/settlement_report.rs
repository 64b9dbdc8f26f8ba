use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Currency, Period};
use crate::modules::settlements::models::CurrencyTotal;

/// Settlement report for one completed batch
///
/// Every amount is per currency; nothing here sums across currencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub batch_id: i64,
    pub period: Period,
    /// Batch status as shown to operators (`completed` or `completed_with_errors`)
    pub status: String,
    /// Set when some records of the period could not be allocated
    pub is_partial: bool,
    pub processed_records: i64,
    pub failed_records: i64,
    /// Gross allocated amount per currency
    pub totals: Vec<CurrencyTotal>,
    /// Amount per beneficiary, UNASSIGNED included
    pub entities: Vec<EntityBreakdown>,
    pub merchants: Vec<MerchantSummary>,
    pub categories: Vec<CategoryBreakdown>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBreakdown {
    /// Entity tag or `UNASSIGNED`
    pub entity: String,
    pub currency: Currency,
    pub amount: Decimal,
    /// Transactions with a share for this beneficiary
    pub record_count: i64,
}

/// Per-merchant gross, fees and net
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantSummary {
    pub merchant_id: String,
    pub currency: Currency,
    pub gross: Decimal,
    /// Shares paid to entities other than the merchant, unassigned excluded
    pub fees: Decimal,
    pub net: Decimal,
    pub record_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub currency: Currency,
    pub amount: Decimal,
    /// Share of the currency's total, 2 decimals
    pub percentage: Decimal,
    pub record_count: i64,
}

impl SettlementReport {
    pub fn total(&self, currency: Currency) -> Decimal {
        self.totals
            .iter()
            .filter(|t| t.currency == currency)
            .map(|t| t.amount)
            .sum()
    }

    pub fn entity_amount(&self, entity: &str, currency: Currency) -> Decimal {
        self.entities
            .iter()
            .filter(|e| e.entity == entity && e.currency == currency)
            .map(|e| e.amount)
            .sum()
    }

    pub fn merchant(&self, merchant_id: &str, currency: Currency) -> Option<&MerchantSummary> {
        self.merchants
            .iter()
            .find(|m| m.merchant_id == merchant_id && m.currency == currency)
    }

    pub fn category(&self, category: &str, currency: Currency) -> Option<&CategoryBreakdown> {
        self.categories
            .iter()
            .find(|c| c.category == category && c.currency == currency)
    }
}
