pub mod batch_generator;

pub use batch_generator::{
    settlement_dimensions, GenerationOutcome, GenerationStart, PendingRun, PeriodLease,
    SettlementBatchGenerator,
};
