// Fee schema persistence
//
// Every write appends a revision row so the schema set can be read back as of
// any instant. Settlement runs only ever read through `snapshot_before`.
//
// Validated writes read the merchant's schemas, validate and write while the
// merchant is locked: under the store's write lock in memory, and under a row
// lock in `fee_schema_merchant_locks` in MySQL, which also holds across
// processes sharing the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::core::{AppError, Result};
use crate::modules::fee_schemas::models::{
    FeeSchema, FeeSchemaRevision, SchemaSnapshot, UpdateFeeSchemaRequest,
};
use crate::modules::fee_schemas::services::schema_validator::{
    FeeSchemaValidator, ValidationOutcome,
};

/// Storage for fee schemas and their revision history
#[async_trait]
pub trait FeeSchemaRepository: Send + Sync {
    /// Insert a new schema, assigning its id and recording revision 1
    async fn insert(&self, schema: FeeSchema) -> Result<FeeSchema>;

    /// Overwrite the current state of a schema and record a new revision
    async fn update(&self, schema: FeeSchema) -> Result<FeeSchema>;

    /// Validate a new schema against the merchant's current schemas and insert it
    async fn insert_validated(
        &self,
        schema: FeeSchema,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)>;

    /// Apply `edit` to the latest state of a schema, validate it against its
    /// siblings and save it
    async fn update_validated(
        &self,
        id: i64,
        edit: &UpdateFeeSchemaRequest,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)>;

    async fn find_by_id(&self, id: i64) -> Result<Option<FeeSchema>>;

    /// Current state of every schema (active or not) for a merchant
    async fn list_by_merchant(&self, merchant_id: &str) -> Result<Vec<FeeSchema>>;

    /// Schema set as recorded strictly before `cutoff`
    async fn snapshot_before(&self, cutoff: DateTime<Utc>) -> Result<SchemaSnapshot>;

    /// Revision history of one schema, oldest first
    async fn revisions(&self, schema_id: i64) -> Result<Vec<FeeSchemaRevision>>;
}

#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    schemas: BTreeMap<i64, FeeSchema>,
    revisions: Vec<FeeSchemaRevision>,
}

impl InMemoryState {
    fn insert(&mut self, mut schema: FeeSchema) -> FeeSchema {
        self.next_id += 1;
        schema.id = self.next_id;

        self.revisions.push(FeeSchemaRevision {
            schema_id: schema.id,
            revision: 1,
            schema: schema.clone(),
            recorded_at: schema.updated_at,
        });
        self.schemas.insert(schema.id, schema.clone());

        schema
    }

    fn update(&mut self, schema: FeeSchema) -> Result<FeeSchema> {
        if !self.schemas.contains_key(&schema.id) {
            return Err(AppError::not_found(format!("Fee schema {}", schema.id)));
        }

        let revision = self
            .revisions
            .iter()
            .filter(|r| r.schema_id == schema.id)
            .map(|r| r.revision)
            .max()
            .unwrap_or(0)
            + 1;

        self.revisions.push(FeeSchemaRevision {
            schema_id: schema.id,
            revision,
            schema: schema.clone(),
            recorded_at: schema.updated_at,
        });
        self.schemas.insert(schema.id, schema.clone());

        Ok(schema)
    }

    fn merchant_schemas(&self, merchant_id: &str) -> Vec<FeeSchema> {
        self.schemas
            .values()
            .filter(|s| s.merchant_id == merchant_id)
            .cloned()
            .collect()
    }
}

/// Process-local schema store
#[derive(Default)]
pub struct InMemoryFeeSchemaRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryFeeSchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeeSchemaRepository for InMemoryFeeSchemaRepository {
    async fn insert(&self, schema: FeeSchema) -> Result<FeeSchema> {
        Ok(self.state.write().await.insert(schema))
    }

    async fn update(&self, schema: FeeSchema) -> Result<FeeSchema> {
        self.state.write().await.update(schema)
    }

    async fn insert_validated(
        &self,
        schema: FeeSchema,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)> {
        let mut state = self.state.write().await;
        let existing = state.merchant_schemas(&schema.merchant_id);
        let outcome = validator.validate(&schema, &existing, None)?;
        Ok((state.insert(schema), outcome))
    }

    async fn update_validated(
        &self,
        id: i64,
        edit: &UpdateFeeSchemaRequest,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)> {
        let mut state = self.state.write().await;
        let mut schema = state
            .schemas
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Fee schema {}", id)))?;
        schema.apply(edit, Utc::now());

        let existing = state.merchant_schemas(&schema.merchant_id);
        let outcome = validator.validate(&schema, &existing, Some(id))?;
        Ok((state.update(schema)?, outcome))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FeeSchema>> {
        Ok(self.state.read().await.schemas.get(&id).cloned())
    }

    async fn list_by_merchant(&self, merchant_id: &str) -> Result<Vec<FeeSchema>> {
        Ok(self.state.read().await.merchant_schemas(merchant_id))
    }

    async fn snapshot_before(&self, cutoff: DateTime<Utc>) -> Result<SchemaSnapshot> {
        let state = self.state.read().await;
        Ok(SchemaSnapshot::from_revisions(cutoff, &state.revisions))
    }

    async fn revisions(&self, schema_id: i64) -> Result<Vec<FeeSchemaRevision>> {
        let state = self.state.read().await;
        let mut revisions: Vec<FeeSchemaRevision> = state
            .revisions
            .iter()
            .filter(|r| r.schema_id == schema_id)
            .cloned()
            .collect();
        revisions.sort_by_key(|r| r.revision);
        Ok(revisions)
    }
}

/// MySQL-backed schema store
pub struct MySqlFeeSchemaRepository {
    pool: MySqlPool,
}

impl MySqlFeeSchemaRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, MySql>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))
    }

    async fn commit(tx: Transaction<'_, MySql>) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))
    }

    /// Hold the merchant's lock row until the transaction ends
    async fn lock_merchant(&self, tx: &mut Transaction<'_, MySql>, merchant_id: &str) -> Result<()> {
        // Created outside the transaction so a rollback never removes it
        sqlx::query("INSERT IGNORE INTO fee_schema_merchant_locks (merchant_id) VALUES (?)")
            .bind(merchant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to register merchant {}: {}", merchant_id, e)))?;

        sqlx::query("SELECT merchant_id FROM fee_schema_merchant_locks WHERE merchant_id = ? FOR UPDATE")
            .bind(merchant_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to lock merchant {}: {}", merchant_id, e)))?;

        Ok(())
    }

    async fn merchant_schemas(
        tx: &mut Transaction<'_, MySql>,
        merchant_id: &str,
    ) -> Result<Vec<FeeSchema>> {
        let rows = sqlx::query_as::<_, FeeSchemaRow>(
            r#"
            SELECT id, entity, merchant_id, amount, is_active, description, created_at, updated_at
            FROM fee_schemas
            WHERE merchant_id = ?
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list fee schemas: {}", e)))?;

        rows.into_iter().map(FeeSchemaRow::into_schema).collect()
    }

    async fn insert_row(tx: &mut Transaction<'_, MySql>, schema: &mut FeeSchema) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO fee_schemas (
                entity, merchant_id, amount, is_active, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schema.entity.as_str())
        .bind(&schema.merchant_id)
        .bind(schema.amount)
        .bind(schema.is_active)
        .bind(&schema.description)
        .bind(schema.created_at)
        .bind(schema.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create fee schema: {}", e)))?;

        schema.id = result.last_insert_id() as i64;
        Self::insert_revision(tx, schema, 1).await
    }

    async fn update_row(tx: &mut Transaction<'_, MySql>, schema: &FeeSchema) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE fee_schemas
            SET entity = ?, amount = ?, is_active = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(schema.entity.as_str())
        .bind(schema.amount)
        .bind(schema.is_active)
        .bind(&schema.description)
        .bind(schema.updated_at)
        .bind(schema.id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to update fee schema: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Fee schema {}", schema.id)));
        }

        let (last_revision,): (Option<i32>,) = sqlx::query_as(
            "SELECT MAX(revision) FROM fee_schema_revisions WHERE schema_id = ? FOR UPDATE",
        )
        .bind(schema.id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read fee schema revision: {}", e)))?;

        Self::insert_revision(tx, schema, last_revision.unwrap_or(0) + 1).await
    }

    async fn insert_revision(
        tx: &mut Transaction<'_, MySql>,
        schema: &FeeSchema,
        revision: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fee_schema_revisions (
                schema_id, revision, entity, merchant_id, amount, is_active,
                description, created_at, updated_at, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(schema.id)
        .bind(revision)
        .bind(schema.entity.as_str())
        .bind(&schema.merchant_id)
        .bind(schema.amount)
        .bind(schema.is_active)
        .bind(&schema.description)
        .bind(schema.created_at)
        .bind(schema.updated_at)
        .bind(schema.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to record fee schema revision: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl FeeSchemaRepository for MySqlFeeSchemaRepository {
    async fn insert(&self, mut schema: FeeSchema) -> Result<FeeSchema> {
        let mut tx = self.begin().await?;
        Self::insert_row(&mut tx, &mut schema).await?;
        Self::commit(tx).await?;
        Ok(schema)
    }

    async fn update(&self, schema: FeeSchema) -> Result<FeeSchema> {
        let mut tx = self.begin().await?;
        Self::update_row(&mut tx, &schema).await?;
        Self::commit(tx).await?;
        Ok(schema)
    }

    async fn insert_validated(
        &self,
        mut schema: FeeSchema,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)> {
        let mut tx = self.begin().await?;
        self.lock_merchant(&mut tx, &schema.merchant_id).await?;

        // Dropping the transaction on a violation rolls it back
        let existing = Self::merchant_schemas(&mut tx, &schema.merchant_id).await?;
        let outcome = validator.validate(&schema, &existing, None)?;

        Self::insert_row(&mut tx, &mut schema).await?;
        Self::commit(tx).await?;
        Ok((schema, outcome))
    }

    async fn update_validated(
        &self,
        id: i64,
        edit: &UpdateFeeSchemaRequest,
        validator: &FeeSchemaValidator,
    ) -> Result<(FeeSchema, ValidationOutcome)> {
        let merchant_id = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Fee schema {}", id)))?
            .merchant_id;

        let mut tx = self.begin().await?;
        self.lock_merchant(&mut tx, &merchant_id).await?;

        let existing = Self::merchant_schemas(&mut tx, &merchant_id).await?;
        let mut schema = existing
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Fee schema {}", id)))?;
        schema.apply(edit, Utc::now());
        let outcome = validator.validate(&schema, &existing, Some(id))?;

        Self::update_row(&mut tx, &schema).await?;
        Self::commit(tx).await?;
        Ok((schema, outcome))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<FeeSchema>> {
        let row = sqlx::query_as::<_, FeeSchemaRow>(
            r#"
            SELECT id, entity, merchant_id, amount, is_active, description, created_at, updated_at
            FROM fee_schemas
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch fee schema: {}", e)))?;

        row.map(FeeSchemaRow::into_schema).transpose()
    }

    async fn list_by_merchant(&self, merchant_id: &str) -> Result<Vec<FeeSchema>> {
        let rows = sqlx::query_as::<_, FeeSchemaRow>(
            r#"
            SELECT id, entity, merchant_id, amount, is_active, description, created_at, updated_at
            FROM fee_schemas
            WHERE merchant_id = ?
            ORDER BY id
            "#,
        )
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list fee schemas: {}", e)))?;

        rows.into_iter().map(FeeSchemaRow::into_schema).collect()
    }

    async fn snapshot_before(&self, cutoff: DateTime<Utc>) -> Result<SchemaSnapshot> {
        let rows = sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT r.schema_id, r.revision, r.entity, r.merchant_id, r.amount, r.is_active,
                   r.description, r.created_at, r.updated_at, r.recorded_at
            FROM fee_schema_revisions r
            JOIN (
                SELECT schema_id, MAX(revision) AS revision
                FROM fee_schema_revisions
                WHERE recorded_at < ?
                GROUP BY schema_id
            ) latest ON latest.schema_id = r.schema_id AND latest.revision = r.revision
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read fee schema snapshot: {}", e)))?;

        let schemas = rows
            .into_iter()
            .map(|row| row.into_revision().map(|rev| rev.schema))
            .collect::<Result<Vec<_>>>()?;

        Ok(SchemaSnapshot::new(cutoff, schemas))
    }

    async fn revisions(&self, schema_id: i64) -> Result<Vec<FeeSchemaRevision>> {
        let rows = sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT schema_id, revision, entity, merchant_id, amount, is_active,
                   description, created_at, updated_at, recorded_at
            FROM fee_schema_revisions
            WHERE schema_id = ?
            ORDER BY revision
            "#,
        )
        .bind(schema_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to list fee schema revisions: {}", e)))?;

        rows.into_iter().map(RevisionRow::into_revision).collect()
    }
}

#[derive(Debug, FromRow)]
struct FeeSchemaRow {
    id: i64,
    entity: String,
    merchant_id: String,
    amount: Decimal,
    is_active: bool,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FeeSchemaRow {
    fn into_schema(self) -> Result<FeeSchema> {
        Ok(FeeSchema {
            id: self.id,
            entity: self.entity.parse().map_err(AppError::Internal)?,
            merchant_id: self.merchant_id,
            amount: self.amount,
            is_active: self.is_active,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RevisionRow {
    schema_id: i64,
    revision: i32,
    entity: String,
    merchant_id: String,
    amount: Decimal,
    is_active: bool,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

impl RevisionRow {
    fn into_revision(self) -> Result<FeeSchemaRevision> {
        let schema = FeeSchemaRow {
            id: self.schema_id,
            entity: self.entity,
            merchant_id: self.merchant_id,
            amount: self.amount,
            is_active: self.is_active,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_schema()?;

        Ok(FeeSchemaRevision {
            schema_id: self.schema_id,
            revision: self.revision,
            schema,
            recorded_at: self.recorded_at,
        })
    }
}
