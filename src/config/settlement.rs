use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::core::{AppError, Result};
use crate::modules::allocations::models::RemainderPolicy;
use crate::modules::fee_schemas::models::FeeEntity;

/// Settlement generation and allocation settings
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Records read from the transaction source per page
    pub page_size: u64,
    /// Share of failed records (0..=1) a batch may carry and still complete
    pub max_failure_ratio: Decimal,
    pub remainder_policy: RemainderPolicy,
    /// Entity absorbing per-transaction rounding differences
    pub reconciliation_entity: FeeEntity,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            max_failure_ratio: Decimal::new(1, 2),
            remainder_policy: RemainderPolicy::Unassigned,
            reconciliation_entity: FeeEntity::Glassbox,
        }
    }
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(SettlementConfig {
            page_size: env::var("SETTLEMENT_PAGE_SIZE")
                .unwrap_or_else(|_| defaults.page_size.to_string())
                .parse()
                .map_err(|_| AppError::Configuration("Invalid SETTLEMENT_PAGE_SIZE".to_string()))?,
            max_failure_ratio: Decimal::from_str(
                &env::var("SETTLEMENT_MAX_FAILURE_RATIO")
                    .unwrap_or_else(|_| defaults.max_failure_ratio.to_string()),
            )
            .map_err(|_| {
                AppError::Configuration("Invalid SETTLEMENT_MAX_FAILURE_RATIO".to_string())
            })?,
            remainder_policy: env::var("ALLOCATION_REMAINDER_POLICY")
                .unwrap_or_else(|_| "unassigned".to_string())
                .parse()
                .map_err(AppError::Configuration)?,
            reconciliation_entity: env::var("ALLOCATION_RECONCILIATION_ENTITY")
                .unwrap_or_else(|_| defaults.reconciliation_entity.to_string())
                .parse()
                .map_err(AppError::Configuration)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AppError::Configuration(
                "Settlement page size must be greater than 0".to_string(),
            ));
        }

        if self.max_failure_ratio < Decimal::ZERO || self.max_failure_ratio > Decimal::ONE {
            return Err(AppError::Configuration(
                "Settlement failure ratio must be between 0 and 1".to_string(),
            ));
        }

        if self.reconciliation_entity == FeeEntity::Merchant {
            return Err(AppError::Configuration(
                "MERCHANT cannot absorb rounding differences".to_string(),
            ));
        }

        Ok(())
    }
}
