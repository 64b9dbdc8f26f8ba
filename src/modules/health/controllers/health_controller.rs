use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;

/// Backends the probes can check
#[derive(Clone, Default)]
pub struct HealthState {
    /// `None` when the service runs on process-local stores
    pub pool: Option<MySqlPool>,
}

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    pub storage: String,
}

/// Readiness probe response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: String,
}

/// GET /health - Liveness probe
/// Does not check dependencies
pub async fn health_check(state: web::Data<HealthState>) -> impl Responder {
    let storage = if state.pool.is_some() { "mysql" } else { "memory" };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "revshare".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage: storage.to_string(),
    })
}

/// GET /ready - Readiness probe
/// Fails with 503 when the configured database cannot be reached
pub async fn readiness_check(state: web::Data<HealthState>) -> impl Responder {
    let Some(pool) = state.pool.as_ref() else {
        return HttpResponse::Ok().json(ReadinessResponse {
            ready: true,
            database: "not_configured".to_string(),
        });
    };

    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => HttpResponse::Ok().json(ReadinessResponse {
            ready: true,
            database: "healthy".to_string(),
        }),
        Err(e) => {
            tracing::error!(error = %e, "Database readiness check failed");
            HttpResponse::ServiceUnavailable().json(ReadinessResponse {
                ready: false,
                database: "unreachable".to_string(),
            })
        }
    }
}

/// Configure health routes (outside the /api scope)
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
