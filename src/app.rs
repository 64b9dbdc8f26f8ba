// Service wiring shared by the binary and the HTTP tests

use std::sync::Arc;

use actix_web::web;
use sqlx::MySqlPool;

use crate::config::SettlementConfig;
use crate::middleware::error_handler;
use crate::modules::fee_schemas::repositories::{
    FeeSchemaRepository, InMemoryFeeSchemaRepository, MySqlFeeSchemaRepository,
};
use crate::modules::fee_schemas::{self, FeeSchemaService};
use crate::modules::health::{self, HealthState};
use crate::modules::reports::{self, ReportService};
use crate::modules::revenue::repositories::{
    InMemoryAggregateRepository, MySqlAggregateRepository, RevenueAggregateRepository,
};
use crate::modules::settlements::repositories::{
    InMemoryBatchRepository, MySqlBatchRepository, MySqlTransactionSource,
    SettlementBatchRepository, TransactionSource,
};
use crate::modules::settlements::{self, SettlementBatchGenerator};

/// Storage backends behind the services
pub struct Stores {
    pub schemas: Arc<dyn FeeSchemaRepository>,
    pub source: Arc<dyn TransactionSource>,
    pub batches: Arc<dyn SettlementBatchRepository>,
    pub aggregates: Arc<dyn RevenueAggregateRepository>,
}

impl Stores {
    /// Process-local stores reading view records from `source`
    pub fn in_memory(source: Arc<dyn TransactionSource>) -> Self {
        Self {
            schemas: Arc::new(InMemoryFeeSchemaRepository::new()),
            source,
            batches: Arc::new(InMemoryBatchRepository::new()),
            aggregates: Arc::new(InMemoryAggregateRepository::new()),
        }
    }

    pub fn mysql(pool: &MySqlPool) -> Self {
        Self {
            schemas: Arc::new(MySqlFeeSchemaRepository::new(pool.clone())),
            source: Arc::new(MySqlTransactionSource::new(pool.clone())),
            batches: Arc::new(MySqlBatchRepository::new(pool.clone())),
            aggregates: Arc::new(MySqlAggregateRepository::new(pool.clone())),
        }
    }
}

/// Application services, cloned into every actix worker
#[derive(Clone)]
pub struct AppState {
    pub fee_schemas: web::Data<FeeSchemaService>,
    pub generator: web::Data<Arc<SettlementBatchGenerator>>,
    pub reports: web::Data<ReportService>,
    pub health: web::Data<HealthState>,
}

impl AppState {
    pub fn new(stores: Stores, config: SettlementConfig, pool: Option<MySqlPool>) -> Self {
        let generator = SettlementBatchGenerator::new(
            Arc::clone(&stores.schemas),
            Arc::clone(&stores.source),
            Arc::clone(&stores.batches),
            Arc::clone(&stores.aggregates),
            config,
        );

        Self {
            fee_schemas: web::Data::new(FeeSchemaService::new(Arc::clone(&stores.schemas))),
            generator: web::Data::new(Arc::new(generator)),
            reports: web::Data::new(ReportService::new(stores.batches, stores.aggregates)),
            health: web::Data::new(HealthState { pool }),
        }
    }

    /// Register shared state and every route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.fee_schemas.clone())
            .app_data(self.generator.clone())
            .app_data(self.reports.clone())
            .app_data(self.health.clone())
            .configure(error_handler::configure)
            .configure(health::configure)
            .service(
                web::scope("/api")
                    .configure(fee_schemas::controllers::configure)
                    .configure(settlements::controllers::configure)
                    .configure(reports::controllers::configure),
            );
    }
}
