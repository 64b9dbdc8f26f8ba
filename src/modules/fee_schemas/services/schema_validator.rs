use rust_decimal::Decimal;
use serde::Serialize;

use crate::modules::fee_schemas::models::{FeeSchema, SchemaViolation};

const MAX_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;
const PERCENTAGE_SCALE: u32 = 2;

/// Result of a successful validation, for UI feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Merchant's allocated percentage if the candidate were applied
    pub total_allocated: Decimal,
    /// Percentage still available for other entities
    pub remaining: Decimal,
}

/// Validates fee schema submissions against a merchant's existing schemas
///
/// Pure function of its inputs. Callers must pass a consistent read of the
/// merchant's schemas; `FeeSchemaService` does that under a per-merchant lock.
pub struct FeeSchemaValidator;

impl FeeSchemaValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate `candidate` against `existing`
    ///
    /// `exclude_id` names the schema being edited so it does not conflict
    /// with (or double count against) its own previous version.
    ///
    /// # Errors
    /// * `AmountOutOfRange` / `TooManyDecimalPlaces` - malformed percentage
    /// * `DuplicateActiveEntity` - another active schema already covers the entity
    /// * `AllocationExceeded` - active percentages would sum past 100
    pub fn validate(
        &self,
        candidate: &FeeSchema,
        existing: &[FeeSchema],
        exclude_id: Option<i64>,
    ) -> Result<ValidationOutcome, SchemaViolation> {
        self.validate_amount(candidate.amount)?;

        let siblings: Vec<&FeeSchema> = existing
            .iter()
            .filter(|s| s.applies_to(&candidate.merchant_id))
            .filter(|s| Some(s.id) != exclude_id)
            .collect();

        let current_total: Decimal = siblings.iter().map(|s| s.amount).sum();

        // An inactive candidate never joins the active set
        if !candidate.is_active {
            return Ok(ValidationOutcome {
                total_allocated: current_total,
                remaining: MAX_PERCENTAGE - current_total,
            });
        }

        if let Some(duplicate) = siblings.iter().find(|s| s.entity == candidate.entity) {
            return Err(SchemaViolation::DuplicateActiveEntity {
                merchant_id: candidate.merchant_id.clone(),
                entity: candidate.entity,
                existing_id: duplicate.id,
            });
        }

        let total_allocated = current_total + candidate.amount;
        if total_allocated > MAX_PERCENTAGE {
            return Err(SchemaViolation::AllocationExceeded {
                merchant_id: candidate.merchant_id.clone(),
                current_total,
                requested: candidate.amount,
            });
        }

        Ok(ValidationOutcome {
            total_allocated,
            remaining: MAX_PERCENTAGE - total_allocated,
        })
    }

    /// Percentage must be within [0, 100] with at most 2 decimal places
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), SchemaViolation> {
        if amount < Decimal::ZERO || amount > MAX_PERCENTAGE {
            return Err(SchemaViolation::AmountOutOfRange { amount });
        }

        if amount.normalize().scale() > PERCENTAGE_SCALE {
            return Err(SchemaViolation::TooManyDecimalPlaces { amount });
        }

        Ok(())
    }
}

impl Default for FeeSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}
