// Fee schema model
//
// A fee schema assigns one business entity a percentage of a merchant's
// advertising revenue. Schemas are scoped per merchant and are never
// hard-deleted: retiring a schema deactivates it so settlement history keeps
// pointing at a real record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{AppError, Result};

/// Business-side recipient of a revenue share
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeEntity {
    /// The platform operator
    Glassbox,
    Sales,
    Broker,
    Merchant,
    /// Partner-fee share (display network owner)
    Partner,
}

impl FeeEntity {
    /// All entities in stable order
    pub const ALL: [FeeEntity; 5] = [
        FeeEntity::Glassbox,
        FeeEntity::Sales,
        FeeEntity::Broker,
        FeeEntity::Merchant,
        FeeEntity::Partner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeEntity::Glassbox => "GLASSBOX",
            FeeEntity::Sales => "SALES",
            FeeEntity::Broker => "BROKER",
            FeeEntity::Merchant => "MERCHANT",
            FeeEntity::Partner => "PARTNER",
        }
    }

    /// Whether a share to this entity is a fee taken from the merchant's revenue
    pub fn is_fee(&self) -> bool {
        match self {
            FeeEntity::Glassbox | FeeEntity::Sales | FeeEntity::Broker | FeeEntity::Partner => true,
            FeeEntity::Merchant => false,
        }
    }
}

impl fmt::Display for FeeEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeeEntity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GLASSBOX" => Ok(FeeEntity::Glassbox),
            "SALES" => Ok(FeeEntity::Sales),
            "BROKER" => Ok(FeeEntity::Broker),
            "MERCHANT" => Ok(FeeEntity::Merchant),
            "PARTNER" => Ok(FeeEntity::Partner),
            _ => Err(format!("Invalid fee entity: {}", s)),
        }
    }
}

/// Percentage allocation rule for one entity on one merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchema {
    /// Store-assigned id; 0 until persisted
    pub id: i64,
    pub entity: FeeEntity,
    pub merchant_id: String,
    /// Percentage share in [0.00, 100.00]
    pub amount: Decimal,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeeSchema {
    pub fn new(
        merchant_id: impl Into<String>,
        entity: FeeEntity,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Self> {
        let merchant_id = merchant_id.into();
        if merchant_id.trim().is_empty() {
            return Err(AppError::validation("Merchant ID cannot be empty"));
        }

        let now = Utc::now();
        Ok(Self {
            id: 0,
            entity,
            merchant_id,
            amount,
            is_active: true,
            description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this schema takes part in allocations for the merchant
    pub fn applies_to(&self, merchant_id: &str) -> bool {
        self.is_active && self.merchant_id == merchant_id
    }

    /// Apply the fields an edit sets. The merchant never changes.
    pub fn apply(&mut self, edit: &UpdateFeeSchemaRequest, at: DateTime<Utc>) {
        if let Some(entity) = edit.entity {
            self.entity = entity;
        }
        if let Some(amount) = edit.amount {
            self.amount = amount;
        }
        if let Some(description) = &edit.description {
            self.description = Some(description.clone());
        }
        if let Some(is_active) = edit.is_active {
            self.is_active = is_active;
        }
        self.updated_at = at;
    }
}

/// Immutable point-in-time copy of a schema, appended on every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchemaRevision {
    pub schema_id: i64,
    /// 1-based, increasing per schema
    pub revision: i32,
    pub schema: FeeSchema,
    pub recorded_at: DateTime<Utc>,
}

/// Schema set as it stood just before `cutoff`
///
/// Allocations for a settlement period are always computed from the snapshot
/// taken at the period's end, so regenerating an old period reproduces the
/// original split even after schemas changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub cutoff: Option<DateTime<Utc>>,
    pub schemas: Vec<FeeSchema>,
}

impl SchemaSnapshot {
    pub fn new(cutoff: DateTime<Utc>, mut schemas: Vec<FeeSchema>) -> Self {
        schemas.sort_by(|a, b| {
            a.merchant_id
                .cmp(&b.merchant_id)
                .then(a.entity.cmp(&b.entity))
                .then(a.id.cmp(&b.id))
        });
        Self {
            cutoff: Some(cutoff),
            schemas,
        }
    }

    /// Build a snapshot from revision history
    pub fn from_revisions(cutoff: DateTime<Utc>, revisions: &[FeeSchemaRevision]) -> Self {
        let mut latest: std::collections::BTreeMap<i64, &FeeSchemaRevision> =
            std::collections::BTreeMap::new();

        for rev in revisions.iter().filter(|r| r.recorded_at < cutoff) {
            match latest.get(&rev.schema_id) {
                Some(current) if current.revision >= rev.revision => {}
                _ => {
                    latest.insert(rev.schema_id, rev);
                }
            }
        }

        Self::new(
            cutoff,
            latest.into_values().map(|rev| rev.schema.clone()).collect(),
        )
    }

    /// Active schemas for a merchant
    pub fn active_for(&self, merchant_id: &str) -> Vec<&FeeSchema> {
        self.schemas
            .iter()
            .filter(|s| s.applies_to(merchant_id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Request body for creating a schema
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeeSchemaRequest {
    pub entity: FeeEntity,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for editing a schema
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFeeSchemaRequest {
    pub entity: Option<FeeEntity>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}
