use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{Currency, Period};
use crate::modules::fee_schemas::models::FeeEntity;

/// Who receives an allocated amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Beneficiary {
    Entity(FeeEntity),
    /// Remainder left when active schemas sum to less than 100%
    Unassigned,
}

impl Beneficiary {
    pub fn entity(&self) -> Option<FeeEntity> {
        match self {
            Beneficiary::Entity(entity) => Some(*entity),
            Beneficiary::Unassigned => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Beneficiary::Entity(entity) => entity.as_str(),
            Beneficiary::Unassigned => "UNASSIGNED",
        }
    }

    /// Whether this amount is a fee deducted from the merchant's revenue
    pub fn is_fee(&self) -> bool {
        self.entity().is_some_and(|e| e.is_fee())
    }
}

impl fmt::Display for Beneficiary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Beneficiary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("UNASSIGNED") {
            return Ok(Beneficiary::Unassigned);
        }
        s.parse::<FeeEntity>().map(Beneficiary::Entity)
    }
}

/// What happens to the part of a transaction no active schema claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Reported as an explicit UNASSIGNED share
    #[default]
    Unassigned,
    /// Credited to the platform (GLASSBOX)
    RetainedByPlatform,
}

impl std::str::FromStr for RemainderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unassigned" => Ok(RemainderPolicy::Unassigned),
            "platform" | "retained_by_platform" => Ok(RemainderPolicy::RetainedByPlatform),
            _ => Err(format!("Invalid remainder policy: {}", s)),
        }
    }
}

/// One beneficiary's share of one transaction
///
/// Derived on demand and never stored on its own. Carries the record's
/// dimensions so it can be rolled up without re-reading the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub transaction_id: String,
    pub beneficiary: Beneficiary,
    /// Schema that produced the share; None for remainders
    pub schema_id: Option<i64>,
    pub amount_allocated: Decimal,
    pub currency: Currency,
    pub period: Period,
    pub merchant_id: String,
    pub partner_id: Option<String>,
    pub category: Option<String>,
    pub device_id: Option<String>,
}

/// Full split of one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAllocation {
    pub transaction_id: String,
    pub gross_amount: Decimal,
    pub currency: Currency,
    /// Sum of active schema percentages for the merchant
    pub allocated_percentage: Decimal,
    pub shares: Vec<AllocationResult>,
}

impl TransactionAllocation {
    /// Sum of shares going to business entities (excludes UNASSIGNED)
    pub fn entity_total(&self) -> Decimal {
        self.shares
            .iter()
            .filter(|s| s.beneficiary != Beneficiary::Unassigned)
            .map(|s| s.amount_allocated)
            .sum()
    }

    pub fn unassigned(&self) -> Decimal {
        self.shares
            .iter()
            .filter(|s| s.beneficiary == Beneficiary::Unassigned)
            .map(|s| s.amount_allocated)
            .sum()
    }

    pub fn share_for(&self, entity: FeeEntity) -> Decimal {
        self.shares
            .iter()
            .filter(|s| s.beneficiary == Beneficiary::Entity(entity))
            .map(|s| s.amount_allocated)
            .sum()
    }
}
