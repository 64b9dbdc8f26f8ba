use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::core::Result;
use crate::modules::reports::models::{
    CategoryBreakdown, EntityBreakdown, MerchantSummary, SettlementReport,
};
use crate::modules::reports::services::ReportService;
use crate::modules::settlements::controllers::settlement_controller::parse_period;

/// Response structure for settlement report
#[derive(Debug, Serialize)]
pub struct SettlementReportResponse {
    pub batch_id: i64,
    pub period: String, // Format: YYYY-MM
    pub status: String,
    pub is_partial: bool,
    pub processed_records: i64,
    pub failed_records: i64,
    pub totals: Vec<CurrencyTotalResponse>,
    pub entities: Vec<EntityBreakdownResponse>,
    pub merchants: Vec<MerchantSummaryResponse>,
    pub categories: Vec<CategoryBreakdownResponse>,
    pub generated_at: String,
}

#[derive(Debug, Serialize)]
pub struct CurrencyTotalResponse {
    pub currency: String,
    pub amount: String, // Decimal as string for JSON precision
}

#[derive(Debug, Serialize)]
pub struct EntityBreakdownResponse {
    pub entity: String,
    pub currency: String,
    pub amount: String,
    pub record_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MerchantSummaryResponse {
    pub merchant_id: String,
    pub currency: String,
    pub gross: String,
    pub fees: String,
    pub net: String,
    pub record_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryBreakdownResponse {
    pub category: String,
    pub currency: String,
    pub amount: String,
    pub percentage: String,
    pub record_count: i64,
}

impl From<SettlementReport> for SettlementReportResponse {
    fn from(report: SettlementReport) -> Self {
        Self {
            batch_id: report.batch_id,
            period: report.period.to_string(),
            status: report.status,
            is_partial: report.is_partial,
            processed_records: report.processed_records,
            failed_records: report.failed_records,
            totals: report
                .totals
                .into_iter()
                .map(|t| CurrencyTotalResponse {
                    currency: t.currency.to_string(),
                    amount: t.amount.to_string(),
                })
                .collect(),
            entities: report
                .entities
                .into_iter()
                .map(EntityBreakdownResponse::from)
                .collect(),
            merchants: report
                .merchants
                .into_iter()
                .map(MerchantSummaryResponse::from)
                .collect(),
            categories: report
                .categories
                .into_iter()
                .map(CategoryBreakdownResponse::from)
                .collect(),
            generated_at: report.generated_at.to_rfc3339(),
        }
    }
}

impl From<EntityBreakdown> for EntityBreakdownResponse {
    fn from(breakdown: EntityBreakdown) -> Self {
        Self {
            entity: breakdown.entity,
            currency: breakdown.currency.to_string(),
            amount: breakdown.amount.to_string(),
            record_count: breakdown.record_count,
        }
    }
}

impl From<MerchantSummary> for MerchantSummaryResponse {
    fn from(summary: MerchantSummary) -> Self {
        Self {
            merchant_id: summary.merchant_id,
            currency: summary.currency.to_string(),
            gross: summary.gross.to_string(),
            fees: summary.fees.to_string(),
            net: summary.net.to_string(),
            record_count: summary.record_count,
        }
    }
}

impl From<CategoryBreakdown> for CategoryBreakdownResponse {
    fn from(breakdown: CategoryBreakdown) -> Self {
        Self {
            category: breakdown.category,
            currency: breakdown.currency.to_string(),
            amount: breakdown.amount.to_string(),
            percentage: breakdown.percentage.to_string(),
            record_count: breakdown.record_count,
        }
    }
}

/// GET /api/reports/settlements/{batch_id}
pub async fn get_batch_report(
    service: web::Data<ReportService>,
    batch_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let report = service.report_for_batch(*batch_id).await?;
    Ok(HttpResponse::Ok().json(SettlementReportResponse::from(report)))
}

/// GET /api/reports/settlements/period/{period}
///
/// Report of the period's current completed batch.
pub async fn get_period_report(
    service: web::Data<ReportService>,
    period: web::Path<String>,
) -> Result<HttpResponse> {
    let period = parse_period(&period)?;
    let report = service.latest_report(period).await?;
    Ok(HttpResponse::Ok().json(SettlementReportResponse::from(report)))
}

/// Configure routes for report module
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reports/settlements")
            .route("/period/{period}", web::get().to(get_period_report))
            .route("/{batch_id}", web::get().to(get_batch_report)),
    );
}
