use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::modules::fee_schemas::models::{
    CreateFeeSchemaRequest, FeeSchema, UpdateFeeSchemaRequest,
};
use crate::modules::fee_schemas::services::{FeeSchemaService, ValidationOutcome};

/// Query parameters for schema listing
#[derive(Debug, Deserialize)]
pub struct ListSchemasQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Query parameters for preview validation
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Schema being edited, excluded from the sibling sum
    pub exclude_id: Option<i64>,
}

/// Fee schema response structure
#[derive(Debug, Serialize)]
pub struct FeeSchemaResponse {
    pub id: i64,
    pub merchant_id: String,
    pub entity: String,
    pub amount: String, // Decimal as string for JSON precision
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Preview validation response
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub total_allocated: String,
    pub remaining: String,
}

impl From<FeeSchema> for FeeSchemaResponse {
    fn from(schema: FeeSchema) -> Self {
        Self {
            id: schema.id,
            merchant_id: schema.merchant_id,
            entity: schema.entity.to_string(),
            amount: schema.amount.to_string(),
            is_active: schema.is_active,
            description: schema.description,
            created_at: schema.created_at.to_rfc3339(),
            updated_at: schema.updated_at.to_rfc3339(),
        }
    }
}

impl From<ValidationOutcome> for ValidationResponse {
    fn from(outcome: ValidationOutcome) -> Self {
        Self {
            valid: true,
            total_allocated: outcome.total_allocated.to_string(),
            remaining: outcome.remaining.to_string(),
        }
    }
}

/// GET /api/merchants/{merchant_id}/fee-schemas
pub async fn list_schemas(
    service: web::Data<FeeSchemaService>,
    merchant_id: web::Path<String>,
    query: web::Query<ListSchemasQuery>,
) -> Result<HttpResponse> {
    let schemas = service.list_schemas(&merchant_id, query.active_only).await?;
    let body: Vec<FeeSchemaResponse> = schemas.into_iter().map(FeeSchemaResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/merchants/{merchant_id}/fee-schemas
pub async fn create_schema(
    service: web::Data<FeeSchemaService>,
    merchant_id: web::Path<String>,
    body: web::Json<CreateFeeSchemaRequest>,
) -> Result<HttpResponse> {
    let schema = service
        .create_schema(&merchant_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(FeeSchemaResponse::from(schema)))
}

/// POST /api/merchants/{merchant_id}/fee-schemas/validate
///
/// Advisory only; the same validation runs again on the real write.
pub async fn preview_schema(
    service: web::Data<FeeSchemaService>,
    merchant_id: web::Path<String>,
    query: web::Query<PreviewQuery>,
    body: web::Json<CreateFeeSchemaRequest>,
) -> Result<HttpResponse> {
    let outcome = service
        .preview(&merchant_id, body.into_inner(), query.exclude_id)
        .await?;
    Ok(HttpResponse::Ok().json(ValidationResponse::from(outcome)))
}

/// PUT /api/fee-schemas/{id}
pub async fn update_schema(
    service: web::Data<FeeSchemaService>,
    id: web::Path<i64>,
    body: web::Json<UpdateFeeSchemaRequest>,
) -> Result<HttpResponse> {
    let schema = service.update_schema(*id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(FeeSchemaResponse::from(schema)))
}

/// POST /api/fee-schemas/{id}/deactivate
pub async fn deactivate_schema(
    service: web::Data<FeeSchemaService>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    let schema = service.deactivate_schema(*id).await?;
    Ok(HttpResponse::Ok().json(FeeSchemaResponse::from(schema)))
}

/// Configure routes for fee schema module
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/merchants/{merchant_id}/fee-schemas")
            .route("", web::get().to(list_schemas))
            .route("", web::post().to(create_schema))
            .route("/validate", web::post().to(preview_schema)),
    )
    .service(
        web::scope("/fee-schemas")
            .route("/{id}", web::put().to(update_schema))
            .route("/{id}/deactivate", web::post().to(deactivate_schema)),
    );
}
