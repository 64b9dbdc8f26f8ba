use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{AppError, Result};
use crate::modules::fee_schemas::models::{
    CreateFeeSchemaRequest, FeeSchema, UpdateFeeSchemaRequest,
};
use crate::modules::fee_schemas::repositories::FeeSchemaRepository;
use crate::modules::fee_schemas::services::schema_validator::{
    FeeSchemaValidator, ValidationOutcome,
};

/// Service owning every fee schema mutation
///
/// Writes go through the repository's validated operations, which run the
/// validator against a fresh read of the merchant's schemas while the
/// merchant is locked, so two concurrent edits cannot both pass the 100% check.
pub struct FeeSchemaService {
    schema_repo: Arc<dyn FeeSchemaRepository>,
    validator: FeeSchemaValidator,
}

impl FeeSchemaService {
    pub fn new(schema_repo: Arc<dyn FeeSchemaRepository>) -> Self {
        Self {
            schema_repo,
            validator: FeeSchemaValidator::new(),
        }
    }

    /// Create a schema for a merchant after validating it against its siblings
    pub async fn create_schema(
        &self,
        merchant_id: &str,
        request: CreateFeeSchemaRequest,
    ) -> Result<FeeSchema> {
        let candidate = FeeSchema::new(
            merchant_id,
            request.entity,
            request.amount,
            request.description,
        )?;

        let (created, outcome) = self
            .schema_repo
            .insert_validated(candidate, &self.validator)
            .await
            .map_err(|e| {
                if let AppError::SchemaViolation(v) = &e {
                    warn!(merchant_id = %merchant_id, violation = %v, "Fee schema rejected");
                }
                e
            })?;

        info!(
            merchant_id = %merchant_id,
            schema_id = created.id,
            entity = %created.entity,
            amount = %created.amount,
            total_allocated = %outcome.total_allocated,
            "Fee schema created"
        );

        Ok(created)
    }

    /// Edit a schema, re-validating it against its siblings excluding itself
    pub async fn update_schema(&self, id: i64, request: UpdateFeeSchemaRequest) -> Result<FeeSchema> {
        let (updated, outcome) = self
            .schema_repo
            .update_validated(id, &request, &self.validator)
            .await
            .map_err(|e| {
                if let AppError::SchemaViolation(v) = &e {
                    warn!(schema_id = id, violation = %v, "Fee schema edit rejected");
                }
                e
            })?;

        info!(
            merchant_id = %updated.merchant_id,
            schema_id = updated.id,
            entity = %updated.entity,
            amount = %updated.amount,
            is_active = updated.is_active,
            total_allocated = %outcome.total_allocated,
            "Fee schema updated"
        );

        Ok(updated)
    }

    /// Retire a schema. Schemas are never deleted so settlement history stays resolvable.
    pub async fn deactivate_schema(&self, id: i64) -> Result<FeeSchema> {
        let current = self.get_schema(id).await?;
        if !current.is_active {
            return Ok(current);
        }

        let retire = UpdateFeeSchemaRequest {
            entity: None,
            amount: None,
            description: None,
            is_active: Some(false),
        };
        let (updated, _) = self
            .schema_repo
            .update_validated(id, &retire, &self.validator)
            .await?;

        info!(
            merchant_id = %updated.merchant_id,
            schema_id = updated.id,
            "Fee schema deactivated"
        );

        Ok(updated)
    }

    /// Dry-run validation for UI feedback; writes nothing
    pub async fn preview(
        &self,
        merchant_id: &str,
        request: CreateFeeSchemaRequest,
        exclude_id: Option<i64>,
    ) -> Result<ValidationOutcome> {
        let candidate = FeeSchema::new(
            merchant_id,
            request.entity,
            request.amount,
            request.description,
        )?;
        let existing = self.schema_repo.list_by_merchant(merchant_id).await?;

        Ok(self.validator.validate(&candidate, &existing, exclude_id)?)
    }

    pub async fn get_schema(&self, id: i64) -> Result<FeeSchema> {
        self.schema_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee schema {}", id)))
    }

    pub async fn list_schemas(&self, merchant_id: &str, active_only: bool) -> Result<Vec<FeeSchema>> {
        let mut schemas = self.schema_repo.list_by_merchant(merchant_id).await?;
        if active_only {
            schemas.retain(|s| s.is_active);
        }
        schemas.sort_by_key(|s| (s.entity, s.id));
        Ok(schemas)
    }
}
