pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{BatchProgress, BatchStatus, SettlementBatch};
pub use repositories::{SettlementBatchRepository, TransactionSource};
pub use services::SettlementBatchGenerator;
