use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::{AppError, Period, Result};
use crate::modules::settlements::models::{BatchProgress, RecordFailure, SettlementBatch};
use crate::modules::settlements::services::{GenerationOutcome, SettlementBatchGenerator};

/// Generate settlement request
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub force_regenerate: bool,
}

/// Settlement batch response structure
#[derive(Debug, Serialize)]
pub struct SettlementBatchResponse {
    pub id: i64,
    pub period: String,
    pub attempt: i32,
    pub force_regenerated: bool,
    pub status: String,
    pub display_status: String,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    pub gross_totals: BTreeMap<String, String>, // Decimal as string for JSON precision
    pub error: Option<String>,
    pub failures: Vec<RecordFailure>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Batch progress response
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub batch_id: i64,
    pub period: String,
    pub status: String,
    pub display_status: String,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    pub percent_complete: String,
}

impl From<SettlementBatch> for SettlementBatchResponse {
    fn from(batch: SettlementBatch) -> Self {
        Self {
            id: batch.id,
            period: batch.period.to_string(),
            attempt: batch.attempt,
            force_regenerated: batch.force_regenerated,
            status: batch.status.to_string(),
            display_status: batch.display_status().to_string(),
            total_records: batch.total_records,
            processed_records: batch.processed_records,
            failed_records: batch.failed_records,
            gross_totals: batch
                .gross_totals
                .iter()
                .map(|t| (t.currency.to_string(), t.amount.to_string()))
                .collect(),
            error: batch.error,
            failures: batch.failures,
            created_at: batch.created_at.to_rfc3339(),
            started_at: batch.started_at.map(|t| t.to_rfc3339()),
            completed_at: batch.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<BatchProgress> for ProgressResponse {
    fn from(progress: BatchProgress) -> Self {
        Self {
            batch_id: progress.batch_id,
            period: progress.period.to_string(),
            status: progress.status.to_string(),
            display_status: progress.display_status.to_string(),
            total_records: progress.total_records,
            processed_records: progress.processed_records,
            failed_records: progress.failed_records,
            percent_complete: progress.percent_complete.to_string(),
        }
    }
}

pub(crate) fn parse_period(raw: &str) -> Result<Period> {
    raw.parse::<Period>().map_err(AppError::Validation)
}

/// POST /api/settlements/{period}/generate
///
/// 202 with the new pending batch, or 200 with the existing completed one.
pub async fn generate_settlement(
    generator: web::Data<Arc<SettlementBatchGenerator>>,
    period: web::Path<String>,
    body: Option<web::Json<GenerateRequest>>,
) -> Result<HttpResponse> {
    let period = parse_period(&period)?;
    let request = body.map(web::Json::into_inner).unwrap_or_default();

    match generator
        .spawn_generation(period, request.force_regenerate)
        .await?
    {
        GenerationOutcome::Existing(batch) => {
            Ok(HttpResponse::Ok().json(SettlementBatchResponse::from(batch)))
        }
        GenerationOutcome::Scheduled(batch) => {
            Ok(HttpResponse::Accepted().json(SettlementBatchResponse::from(batch)))
        }
    }
}

/// GET /api/settlements/{period}/batches
pub async fn list_batches(
    generator: web::Data<Arc<SettlementBatchGenerator>>,
    period: web::Path<String>,
) -> Result<HttpResponse> {
    let period = parse_period(&period)?;
    let batches = generator.list_batches(period).await?;
    let body: Vec<SettlementBatchResponse> = batches
        .into_iter()
        .map(SettlementBatchResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/settlements/batches/{id}
pub async fn get_batch(
    generator: web::Data<Arc<SettlementBatchGenerator>>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    let batch = generator.get_batch(*id).await?;
    Ok(HttpResponse::Ok().json(SettlementBatchResponse::from(batch)))
}

/// GET /api/settlements/batches/{id}/progress
pub async fn get_progress(
    generator: web::Data<Arc<SettlementBatchGenerator>>,
    id: web::Path<i64>,
) -> Result<HttpResponse> {
    let progress = generator.progress(*id).await?;
    Ok(HttpResponse::Ok().json(ProgressResponse::from(progress)))
}

/// Configure routes for settlement module
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/settlements")
            .route("/batches/{id}", web::get().to(get_batch))
            .route("/batches/{id}/progress", web::get().to(get_progress))
            .route("/{period}/generate", web::post().to(generate_settlement))
            .route("/{period}/batches", web::get().to(list_batches)),
    );
}
