pub mod settlement_batch;

pub use settlement_batch::{BatchProgress, BatchStatus, CurrencyTotal, RecordFailure, SettlementBatch};
