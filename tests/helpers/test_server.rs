// Test Application Helpers
//
// Builds the full application state on in-memory stores. Contract tests
// wrap it with `actix_web::test::init_service`:
//
//   let ctx = TestContext::new();
//   let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

use std::sync::Arc;

use revshare::app::{AppState, Stores};
use revshare::config::SettlementConfig;
use revshare::fee_schemas::{FeeSchemaRepository, InMemoryFeeSchemaRepository};
use revshare::revenue::repositories::{InMemoryAggregateRepository, RevenueAggregateRepository};
use revshare::settlements::repositories::{
    InMemoryBatchRepository, InMemoryTransactionSource, SettlementBatchRepository,
};

pub struct TestContext {
    pub state: AppState,
    pub source: Arc<InMemoryTransactionSource>,
    pub schemas: Arc<InMemoryFeeSchemaRepository>,
    pub batches: Arc<InMemoryBatchRepository>,
    pub aggregates: Arc<InMemoryAggregateRepository>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(SettlementConfig::default())
    }

    pub fn with_config(config: SettlementConfig) -> Self {
        let source = Arc::new(InMemoryTransactionSource::new());
        let schemas = Arc::new(InMemoryFeeSchemaRepository::new());
        let batches = Arc::new(InMemoryBatchRepository::new());
        let aggregates = Arc::new(InMemoryAggregateRepository::new());

        let stores = Stores {
            schemas: schemas.clone() as Arc<dyn FeeSchemaRepository>,
            source: source.clone(),
            batches: batches.clone() as Arc<dyn SettlementBatchRepository>,
            aggregates: aggregates.clone() as Arc<dyn RevenueAggregateRepository>,
        };

        Self {
            state: AppState::new(stores, config, None),
            source,
            schemas,
            batches,
            aggregates,
        }
    }
}
