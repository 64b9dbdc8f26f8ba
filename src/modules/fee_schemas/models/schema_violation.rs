use rust_decimal::Decimal;
use serde::Serialize;

use super::FeeEntity;

/// Invariant a rejected fee schema submission violated
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum SchemaViolation {
    #[error("percentage {amount} is outside [0, 100]")]
    AmountOutOfRange { amount: Decimal },

    #[error("percentage {amount} has more than 2 decimal places")]
    TooManyDecimalPlaces { amount: Decimal },

    #[error("merchant '{merchant_id}' already has an active {entity} schema (id {existing_id})")]
    DuplicateActiveEntity {
        merchant_id: String,
        entity: FeeEntity,
        existing_id: i64,
    },

    #[error(
        "merchant '{merchant_id}' would be allocated {}% ({current_total}% existing + {requested}% requested), exceeding 100%",
        .current_total + .requested
    )]
    AllocationExceeded {
        merchant_id: String,
        current_total: Decimal,
        requested: Decimal,
    },
}
